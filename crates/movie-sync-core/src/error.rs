use movie_sync_client::ApiError;
use thiserror::Error;

/// Outcome of a rejected store operation.
///
/// Everything except `Remote` is detected locally, before any request is sent.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("movie is already in this collection")]
    AlreadyExists,

    #[error("movie is not in this collection")]
    NotFound,

    #[error("watchlist {0} not found")]
    WatchlistNotFound(String),

    /// Another change to the same movie in the same collection has not settled yet
    #[error("a change to this item is still in progress")]
    MutationPending,

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Remote(#[from] ApiError),
}

impl StoreError {
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Remote(err) => err.user_message(),
            other => {
                let text = other.to_string();
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => text,
                }
            }
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, StoreError::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        assert_eq!(StoreError::AlreadyExists.user_message(), "Movie is already in this collection");
        assert_eq!(
            StoreError::Remote(ApiError::Network("reset".to_string())).user_message(),
            "Check your connection and try again."
        );
        assert!(StoreError::MutationPending.is_local());
    }
}
