use crate::error::ApiError;
use crate::session::Session;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One call against the backend, independent of how it gets sent
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub options: RequestOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((key.into(), value.into()));
        self
    }
}

/// Anything that can execute an `ApiRequest` and hand back the JSON body.
///
/// `Transport` is the real implementation; tests swap in counting or failing
/// backends.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// Backoff applied to 429 responses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// `base_delay * 2^attempt` plus up to `max_jitter` of random jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        exponential + jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Transport {
    http: Client,
    base_url: String,
    session: Arc<Session>,
    retry: RetryPolicy,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, session: Arc<Session>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, session, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        session: Arc<Session>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        let mut attempt: u32 = 0;

        loop {
            let mut builder = self.http.request(method.clone(), &url);
            if !options.query.is_empty() {
                builder = builder.query(&options.query);
            }
            if let Some(token) = self.session.token() {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.retry.max_retries {
                    let delay = self.retry.delay_for(attempt);
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        retry_after = ?retry_after,
                        path = %path,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(ApiError::RateLimited { attempts: attempt + 1 });
            }

            if status == StatusCode::UNAUTHORIZED {
                self.session.expire();
                return Err(ApiError::Auth);
            }

            let text = response
                .text()
                .await
                .map_err(|e| ApiError::Network(format!("failed to read response body: {}", e)))?;

            if !status.is_success() {
                debug!(status = status.as_u16(), path = %path, "request rejected");
                return Err(ApiError::from_status(status.as_u16(), &text));
            }

            if text.trim().is_empty() {
                return Ok(Value::Null);
            }

            let body: Value = serde_json::from_str(&text)?;
            // Some endpoints answer 200 with an explicit failure envelope
            if body.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(ApiError::from_status(status.as_u16().max(400), &text));
            }
            return Ok(body);
        }
    }
}

#[async_trait]
impl Backend for Transport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.request(request.method, &request.path, request.body.as_ref(), &request.options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEvent;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(3));
        }
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/profile/minimal"))
            .and(header("Authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "user": {"id": "u1"}})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let session = Arc::new(Session::with_token("secret-token"));
        let transport = Transport::new(mock_server.uri(), session).unwrap();
        let body = transport.send(ApiRequest::get("/users/profile/minimal")).await.unwrap();
        assert_eq!(body["user"]["id"], "u1");
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/discover/popular"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movies/discover/popular"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = Transport::new(mock_server.uri(), Arc::new(Session::new()))
            .unwrap()
            .with_retry_policy(fast_retry());
        let result = transport.send(ApiRequest::get("/movies/discover/popular")).await;

        assert!(result.is_ok());
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/search"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&mock_server)
            .await;

        let transport = Transport::new(mock_server.uri(), Arc::new(Session::new()))
            .unwrap()
            .with_retry_policy(fast_retry());
        let result = transport
            .send(ApiRequest::get("/movies/search").with_query("query", "alien"))
            .await;

        assert_eq!(result.unwrap_err(), ApiError::RateLimited { attempts: 4 });
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let session = Arc::new(Session::with_token("stale"));
        let mut events = session.subscribe();
        let transport = Transport::new(mock_server.uri(), Arc::clone(&session)).unwrap();

        let result = transport.send(ApiRequest::get("/users/profile")).await;

        assert_eq!(result.unwrap_err(), ApiError::Auth);
        assert!(!session.is_authenticated());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/favorites"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = Transport::new(mock_server.uri(), Arc::new(Session::new()))
            .unwrap()
            .with_retry_policy(fast_retry());
        let result = transport
            .send(ApiRequest::post("/users/favorites", json!({"movieId": "42"})))
            .await;

        assert!(matches!(result.unwrap_err(), ApiError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_success_false_envelope_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/search"))
            .and(query_param("query", "x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "Query too short"})),
            )
            .mount(&mock_server)
            .await;

        let transport = Transport::new(mock_server.uri(), Arc::new(Session::new())).unwrap();
        let result = transport.send(ApiRequest::get("/movies/search").with_query("query", "x")).await;

        assert_eq!(
            result.unwrap_err(),
            ApiError::Validation { status: 400, message: "Query too short".to_string() }
        );
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/genres"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"genres": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let transport = Transport::with_timeout(
            mock_server.uri(),
            Arc::new(Session::new()),
            Duration::from_millis(100),
        )
        .unwrap();
        match transport.send(ApiRequest::get("/movies/genres")).await {
            Err(ApiError::Network(message)) => assert!(message.contains("timed out"), "{}", message),
            other => panic!("expected a network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let transport = Transport::with_timeout(
            "http://127.0.0.1:9",
            Arc::new(Session::new()),
            Duration::from_secs(2),
        )
        .unwrap();
        let result = transport.send(ApiRequest::get("/movies/genres")).await;
        assert!(result.unwrap_err().is_network());
    }
}
