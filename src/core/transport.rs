//! HTTP Transport
//!
//! HTTP client interface and implementations for token and API requests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{AnalyticsError, AnalyticsResult, ConfigurationError, NetworkError};
use crate::types::{DEFAULT_MAX_ERROR_BODY_BYTES, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT};

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Request headers, names lowercased when set through `with_header`.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Request timeout override.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a new GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a new POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a header, replacing any previous value under the same name in
    /// any casing. Names are stored lowercased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Response body. Non-success bodies are cut just past the snippet size.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    ///
    /// Non-success statuses are returned as responses, not errors.
    async fn send(&self, request: HttpRequest) -> AnalyticsResult<HttpResponse>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
    max_response_bytes: usize,
    max_error_body_bytes: usize,
}

impl ReqwestHttpTransport {
    /// Create new transport with default settings.
    pub fn new() -> AnalyticsResult<Self> {
        Self::with_options(
            DEFAULT_TIMEOUT,
            DEFAULT_MAX_RESPONSE_BYTES,
            DEFAULT_MAX_ERROR_BODY_BYTES,
        )
    }

    /// Create transport with custom options.
    pub fn with_options(
        timeout: Duration,
        max_response_bytes: usize,
        max_error_body_bytes: usize,
    ) -> AnalyticsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
            max_response_bytes,
            max_error_body_bytes,
        })
    }

    fn map_send_error(e: reqwest::Error, timeout: Duration) -> AnalyticsError {
        if e.is_timeout() {
            NetworkError::Timeout { timeout }.into()
        } else {
            NetworkError::ConnectionFailed {
                message: e.to_string(),
            }
            .into()
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    async fn send(&self, request: HttpRequest) -> AnalyticsResult<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            req_builder = req_builder.header(name, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let mut response = req_builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let success = response.status().is_success();

        if success {
            if let Some(len) = response.content_length() {
                if len as usize > self.max_response_bytes {
                    return Err(NetworkError::ResponseTooLarge { size: len as usize }.into());
                }
            }
        }

        // Error bodies keep one byte past the snippet size so callers can tell
        // they were cut; success bodies must fit whole.
        let limit = if success {
            self.max_response_bytes
        } else {
            self.max_error_body_bytes.saturating_add(1)
        };

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?
        {
            if body.len() + chunk.len() > limit {
                if success {
                    return Err(NetworkError::ResponseTooLarge {
                        size: body.len() + chunk.len(),
                    }
                    .into());
                }
                body.extend_from_slice(&chunk[..limit - body.len()]);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        debug!(status, bytes = body.len(), "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockHttpTransport;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock HTTP transport for testing. Responses are served in queue order.
    #[derive(Default)]
    pub struct MockHttpTransport {
        responses: Mutex<VecDeque<AnalyticsResult<HttpResponse>>>,
        request_history: Mutex<Vec<HttpRequest>>,
        delay: Option<Duration>,
    }

    impl MockHttpTransport {
        /// Create new mock transport.
        pub fn new() -> Self {
            Self::default()
        }

        /// Wait before answering each request.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Queue a response to return.
        pub fn queue_response(&self, response: HttpResponse) -> &Self {
            self.responses.lock().unwrap().push_back(Ok(response));
            self
        }

        /// Queue a JSON response.
        pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
            self.queue_response(HttpResponse {
                status,
                headers: [("content-type".to_string(), "application/json".to_string())]
                    .into_iter()
                    .collect(),
                body: serde_json::to_vec(body).unwrap(),
            })
        }

        /// Queue a raw text response.
        pub fn queue_text_response(&self, status: u16, body: &str) -> &Self {
            self.queue_response(HttpResponse {
                status,
                headers: HashMap::new(),
                body: body.as_bytes().to_vec(),
            })
        }

        /// Queue a transport failure.
        pub fn queue_error(&self, error: AnalyticsError) -> &Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        /// Get request history.
        pub fn get_requests(&self) -> Vec<HttpRequest> {
            self.request_history.lock().unwrap().clone()
        }

        /// Get last request.
        pub fn get_last_request(&self) -> Option<HttpRequest> {
            self.request_history.lock().unwrap().last().cloned()
        }

        /// Number of requests seen.
        pub fn request_count(&self) -> usize {
            self.request_history.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for MockHttpTransport {
        async fn send(&self, request: HttpRequest) -> AnalyticsResult<HttpResponse> {
            self.request_history.lock().unwrap().push(request);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let response = self.responses.lock().unwrap().pop_front();
            response.unwrap_or_else(|| {
                Err(NetworkError::ConnectionFailed {
                    message: "No mock response available".to_string(),
                }
                .into())
            })
        }
    }
}
