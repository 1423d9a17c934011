//! Analytics Error Types
//!
//! Closed error hierarchy: one enum per failure category, folded into
//! [`AnalyticsError`] so callers can branch on the category instead of
//! matching strings.
//!
//! Every error is `Clone`: the token manager hands the outcome of a single
//! refresh to all callers that waited on it.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the analytics integration.
#[derive(Error, Debug, Clone)]
pub enum AnalyticsError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl AnalyticsError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ANALYTICS_CONFIG",
            Self::Network(_) => "ANALYTICS_NETWORK",
            Self::Auth(_) => "ANALYTICS_AUTH",
            Self::Decode(_) => "ANALYTICS_DECODE",
            Self::Lookup(_) => "ANALYTICS_LOOKUP",
            Self::Persistence(_) => "ANALYTICS_PERSISTENCE",
        }
    }

    /// Check if a caller-level retry may succeed.
    ///
    /// Nothing inside the crate retries on its own; this only informs
    /// [`crate::resilience::RetryExecutor`] and similar caller policies.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Auth(AuthError::Rejected { status, .. }) => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if the failure indicates the bearer token was not accepted.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Network(NetworkError::UnexpectedStatus { status: 401, .. })
        )
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("Unknown endpoint name: {name}")]
    UnknownEndpoint { name: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("HTTP client setup failed: {message}")]
    HttpClient { message: String },
}

/// Network/transport error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            Self::ResponseTooLarge { .. } | Self::InvalidResponse { .. } => false,
        }
    }
}

/// Authorization server error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization server rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed authorization response: {message}")]
    MalformedResponse { message: String },

    #[error("Unsupported token type: {token_type}")]
    UnsupportedTokenType { token_type: String },
}

/// Wire value decoding error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid numeric value: {value}")]
    InvalidNumeric { value: String },

    #[error("non-integral numeric value: {value}")]
    NonIntegral { value: String },

    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    #[error("malformed body at line {line}, column {column}: {message}")]
    Body {
        message: String,
        line: usize,
        column: usize,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Body {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        }
    }
}

/// Column lookup error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("KPI type {name:?} not found")]
    UnknownKpiType { name: String },

    #[error("Config id {id:?} not found")]
    UnknownConfigId { id: String },

    #[error("Column index {index} out of range for {len} columns")]
    ColumnOutOfRange { index: usize, len: usize },
}

/// Token cache persistence error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("No cached token at {path}")]
    NotFound { path: String },

    #[error("Corrupted token cache {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Read failed for {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Write failed for {path}: {message}")]
    WriteFailed { path: String, message: String },
}

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// OAuth2 error response from the authorization server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Cut `body` down to at most `limit` bytes on a char boundary.
pub fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Create an authorization error from a non-200 token endpoint response.
pub fn create_auth_error_from_response(status: u16, body: &str, limit: usize) -> AuthError {
    let message = match parse_error_response(body) {
        Some(response) => match response.error_description {
            Some(description) => format!("{}: {}", response.error, description),
            None => response.error,
        },
        None => truncate_body(body, limit),
    };

    AuthError::Rejected { status, message }
}
