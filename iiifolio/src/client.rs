//! HTTP client abstraction for testability.
//!
//! Image servers are reached exclusively through the [`HttpClient`] trait so
//! the engine can be exercised against scripted responses in tests without
//! touching the network.

use std::future::Future;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors raised by the HTTP transport layer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HttpError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read.
    #[error("failed to read response: {0}")]
    Body(String),
}

/// Trait for asynchronous HTTP GET operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// Default User-Agent string for HTTP requests.
/// Some image servers reject requests that carry no User-Agent at all.
const DEFAULT_USER_AGENT: &str = concat!("iiifolio/", env!("CARGO_PKG_VERSION"));

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with a 30 second per-request timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(30)
    }

    /// Creates a new ReqwestClient with a custom per-request timeout.
    ///
    /// Connection pooling is tuned for many small tile requests against a
    /// single host.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| HttpError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        trace!(url = url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(HttpError::Transport(e.to_string()));
            }
        };

        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "HTTP error status"
            );
            return Err(HttpError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(HttpError::Body(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock HTTP client scripted with per-URL responses.
    ///
    /// URLs without a scripted response receive `default_response`. Every
    /// requested URL is appended to `requests` so tests can assert which
    /// URLs were (or were not) fetched.
    pub struct MockHttpClient {
        responses: HashMap<String, Result<Vec<u8>, HttpError>>,
        default_response: Result<Vec<u8>, HttpError>,
        requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        /// Creates a mock that answers every URL with `default_response`.
        pub fn new(default_response: Result<Vec<u8>, HttpError>) -> Self {
            Self {
                responses: HashMap::new(),
                default_response,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Scripts a response for one exact URL.
        pub fn with_response(mut self, url: &str, response: Result<Vec<u8>, HttpError>) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }

        /// Returns every URL requested so far, in request order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        /// Returns how many requested URLs contained `fragment`.
        pub fn requests_matching(&self, fragment: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.contains(fragment))
                .count()
        }
    }

    impl HttpClient for MockHttpClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .unwrap_or(&self.default_response)
                .clone()
        }
    }

    #[tokio::test]
    async fn test_mock_client_default_response() {
        let mock = MockHttpClient::new(Ok(vec![1, 2, 3, 4]));

        let result = mock.get("http://example.com").await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_mock_client_scripted_url() {
        let mock = MockHttpClient::new(Ok(vec![0]))
            .with_response("http://example.com/a", Ok(vec![1]))
            .with_response(
                "http://example.com/b",
                Err(HttpError::Status {
                    status: 404,
                    url: "http://example.com/b".to_string(),
                }),
            );

        assert_eq!(mock.get("http://example.com/a").await.unwrap(), vec![1]);
        assert!(mock.get("http://example.com/b").await.is_err());
        assert_eq!(mock.get("http://example.com/c").await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_mock_client_records_requests() {
        let mock = MockHttpClient::new(Ok(vec![]));

        let _ = mock.get("http://example.com/x").await;
        let _ = mock.get("http://example.com/y").await;

        assert_eq!(
            mock.requests(),
            vec!["http://example.com/x", "http://example.com/y"]
        );
        assert_eq!(mock.requests_matching("/x"), 1);
        assert_eq!(mock.requests_matching("example.com"), 2);
    }

    #[test]
    fn test_http_error_display() {
        let err = HttpError::Status {
            status: 503,
            url: "http://example.com/tile".to_string(),
        };
        assert_eq!(format!("{}", err), "HTTP 503 from http://example.com/tile");
    }
}
