use thiserror::Error;

/// Failure classes surfaced by the transport and everything layered on it.
///
/// `Clone` so that one coalesced failure can be handed to every waiting caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// No response reached us (connect failure, timeout, broken body)
    #[error("network error: {0}")]
    Network(String),

    /// 401 from the backend; the session credential has been cleared
    #[error("not authenticated or session expired")]
    Auth,

    /// 429 that kept coming back after every retry
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Any other 4xx
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// 5xx
    #[error("server error ({status})")]
    Server { status: u16, message: Option<String> },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

const GENERIC_VALIDATION_MESSAGE: &str = "The request was rejected";

impl ApiError {
    /// Classify a non-success, non-401/429 status using the body for the message
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body);
        if status >= 500 {
            ApiError::Server { status, message }
        } else {
            ApiError::Validation {
                status,
                message: message.unwrap_or_else(|| GENERIC_VALIDATION_MESSAGE.to_string()),
            }
        }
    }

    /// Text meant for the person using the app
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "Check your connection and try again.".to_string(),
            ApiError::Auth => "Your session has expired. Please sign in again.".to_string(),
            ApiError::RateLimited { .. } => "Too many requests. Please wait a moment.".to_string(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Server { .. } => "Something went wrong on our side. Try again later.".to_string(),
            ApiError::Decode(_) | ApiError::Internal(_) => "Unexpected error. Try again later.".to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Pull `message` (or `error`) out of a JSON error body
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|m| m.as_str())
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network(format!("request timed out: {}", err))
        } else if err.is_builder() {
            ApiError::Internal(format!("could not build request: {}", err))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_uses_server_message() {
        let err = ApiError::from_status(400, r#"{"success":false,"message":"Movie already in favorites"}"#);
        assert_eq!(
            err,
            ApiError::Validation { status: 400, message: "Movie already in favorites".to_string() }
        );
        assert_eq!(err.user_message(), "Movie already in favorites");
    }

    #[test]
    fn test_validation_falls_back_to_generic_message() {
        let err = ApiError::from_status(422, "<html>nope</html>");
        assert_eq!(err.user_message(), GENERIC_VALIDATION_MESSAGE);
    }

    #[test]
    fn test_server_error_classification() {
        let err = ApiError::from_status(503, "");
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
        assert!(err.user_message().contains("Try again later"));
    }
}
