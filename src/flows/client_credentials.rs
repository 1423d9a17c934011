//! Client Credentials Flow
//!
//! RFC 6749 Section 4.4 - Client Credentials Grant, with a JSON request body.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::{HttpRequest, HttpTransport};
use crate::error::{create_auth_error_from_response, AnalyticsResult, AuthError};
use crate::types::{expiry_instant, AnalyticsConfig, ClientCredentials, Token, TokenResponse};

/// Client Credentials Flow interface.
#[async_trait]
pub trait ClientCredentialsFlow: Send + Sync {
    /// Request a fresh access token from the authorization server.
    async fn request_token(&self) -> AnalyticsResult<Token>;
}

#[derive(Serialize)]
struct TokenRequestBody<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audience: Option<&'a str>,
    grant_type: &'static str,
}

/// Client Credentials Flow implementation.
pub struct ClientCredentialsFlowImpl<T: HttpTransport> {
    token_url: String,
    credentials: ClientCredentials,
    timeout: Duration,
    max_error_body_bytes: usize,
    transport: Arc<T>,
}

impl<T: HttpTransport> ClientCredentialsFlowImpl<T> {
    /// Create new Client Credentials Flow.
    pub fn new(config: &AnalyticsConfig, transport: Arc<T>) -> Self {
        Self {
            token_url: config.auth_url.clone(),
            credentials: config.credentials.clone(),
            timeout: config.timeout,
            max_error_body_bytes: config.max_error_body_bytes,
            transport,
        }
    }

    fn build_request_body(&self) -> AnalyticsResult<Vec<u8>> {
        let body = TokenRequestBody {
            client_id: &self.credentials.client_id,
            client_secret: self.credentials.client_secret.expose_secret(),
            audience: self.credentials.audience.as_deref(),
            grant_type: "client_credentials",
        };

        serde_json::to_vec(&body).map_err(|e| {
            AuthError::MalformedResponse {
                message: format!("failed to encode token request: {}", e),
            }
            .into()
        })
    }
}

#[async_trait]
impl<T: HttpTransport> ClientCredentialsFlow for ClientCredentialsFlowImpl<T> {
    async fn request_token(&self) -> AnalyticsResult<Token> {
        let http_request = HttpRequest::post(&self.token_url)
            .with_header("content-type", "application/json")
            .with_header("accept", "application/json")
            .with_body(self.build_request_body()?)
            .with_timeout(self.timeout);

        debug!(client_id = %self.credentials.client_id, "Requesting client credentials token");

        let response = self.transport.send(http_request).await?;

        if response.status != 200 {
            return Err(create_auth_error_from_response(
                response.status,
                &response.text(),
                self.max_error_body_bytes,
            )
            .into());
        }

        let token_response: TokenResponse =
            response
                .json()
                .map_err(|e| AuthError::MalformedResponse {
                    message: e.to_string(),
                })?;

        if token_response.access_token.is_empty() {
            return Err(AuthError::MalformedResponse {
                message: "empty access_token".to_string(),
            }
            .into());
        }
        if token_response.expires_in < 0 {
            return Err(AuthError::MalformedResponse {
                message: format!("negative expires_in {}", token_response.expires_in),
            }
            .into());
        }
        if let Some(token_type) = &token_response.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(AuthError::UnsupportedTokenType {
                    token_type: token_type.clone(),
                }
                .into());
            }
        }

        let issued_at = Utc::now();
        if expiry_instant(issued_at, token_response.expires_in).is_none() {
            return Err(AuthError::MalformedResponse {
                message: format!("expires_in {} out of range", token_response.expires_in),
            }
            .into());
        }

        Ok(Token::new(
            token_response.access_token,
            issued_at,
            token_response.expires_in,
        ))
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockClientCredentialsFlow;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock Client Credentials Flow for testing.
    ///
    /// Serves queued outcomes in order, then issues numbered tokens.
    #[derive(Default)]
    pub struct MockClientCredentialsFlow {
        outcomes: Mutex<VecDeque<AnalyticsResult<Token>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
        ttl_secs: Option<i64>,
    }

    impl MockClientCredentialsFlow {
        /// Create new mock flow.
        pub fn new() -> Self {
            Self::default()
        }

        /// Wait before answering each request.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Lifetime of generated tokens.
        pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
            self.ttl_secs = Some(ttl_secs);
            self
        }

        /// Queue a token to return.
        pub fn queue_token(&self, token: Token) -> &Self {
            self.outcomes.lock().unwrap().push_back(Ok(token));
            self
        }

        /// Queue an error to return.
        pub fn queue_error(&self, error: impl Into<crate::error::AnalyticsError>) -> &Self {
            self.outcomes.lock().unwrap().push_back(Err(error.into()));
            self
        }

        /// Number of token requests made.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClientCredentialsFlow for MockClientCredentialsFlow {
        async fn request_token(&self) -> AnalyticsResult<Token> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(outcome) = self.outcomes.lock().unwrap().pop_front() {
                return outcome;
            }

            Ok(Token::new(
                format!("mock-token-{}", n),
                Utc::now(),
                self.ttl_secs.unwrap_or(3600),
            ))
        }
    }
}
