//! Configuration Builder
//!
//! Fluent builder for analytics configuration.

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::{
    AnalyticsConfig, ClientCredentials, EndpointRegistry, DEFAULT_API_VERSION,
    DEFAULT_API_VERSION_HEADER, DEFAULT_MAX_ERROR_BODY_BYTES, DEFAULT_MAX_RESPONSE_BYTES,
    DEFAULT_TIMEOUT,
};

/// Analytics configuration builder.
#[derive(Default)]
pub struct AnalyticsConfigBuilder {
    auth_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    audience: Option<String>,
    token_cache_path: Option<PathBuf>,
    hist_endpoint: Option<String>,
    base_url: Option<String>,
    api_version_header: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
    max_error_body_bytes: Option<usize>,
    max_response_bytes: Option<usize>,
    endpoints: EndpointRegistry,
}

impl AnalyticsConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from process environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AUTH_URL`, `CLIENT_ID`, `CLIENT_SECRET`, `TOKEN_CACHE` (required at build)
    /// - `AUDIENCE`, `HIST_ENDPOINT`, `ANALYTICS_BASE_URL` (optional)
    /// - `ANALYTICS_TIMEOUT_SECS` (optional, seconds)
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create a builder from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();

        if let Some(v) = lookup("AUTH_URL") {
            builder = builder.auth_url(v);
        }
        if let Some(v) = lookup("CLIENT_ID") {
            builder = builder.client_id(v);
        }
        if let Some(v) = lookup("CLIENT_SECRET") {
            builder = builder.client_secret(v);
        }
        if let Some(v) = lookup("AUDIENCE") {
            builder = builder.audience(v);
        }
        if let Some(v) = lookup("TOKEN_CACHE") {
            builder = builder.token_cache_path(v);
        }
        if let Some(v) = lookup("HIST_ENDPOINT") {
            builder = builder.hist_endpoint(v);
        }
        if let Some(v) = lookup("ANALYTICS_BASE_URL") {
            builder = builder.base_url(v);
        }
        if let Some(v) = lookup("ANALYTICS_TIMEOUT_SECS") {
            let secs = v
                .parse::<u64>()
                .map_err(|_| ConfigurationError::InvalidConfig {
                    message: format!("ANALYTICS_TIMEOUT_SECS is not a number: {}", v),
                })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    /// Set authorization server token URL.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set audience.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set token cache file path.
    pub fn token_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_cache_path = Some(path.into());
        self
    }

    /// Set historical data endpoint.
    pub fn hist_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.hist_endpoint = Some(endpoint.into());
        self
    }

    /// Set base URL for named endpoints.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the API version header.
    pub fn api_version(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_version_header = Some(header.into());
        self.api_version = Some(value.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the error body snippet size.
    pub fn max_error_body_bytes(mut self, bytes: usize) -> Self {
        self.max_error_body_bytes = Some(bytes);
        self
    }

    /// Set the largest accepted success body.
    pub fn max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = Some(bytes);
        self
    }

    /// Register a named endpoint.
    pub fn endpoint(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.endpoints.insert(name, address);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<AnalyticsConfig, ConfigurationError> {
        let auth_url = required(self.auth_url, "auth_url")?;
        validate_url(&auth_url)?;

        let client_id = required(self.client_id, "client_id")?;
        let client_secret =
            self.client_secret
                .ok_or_else(|| ConfigurationError::MissingRequired {
                    field: "client_secret".to_string(),
                })?;

        let token_cache_path =
            self.token_cache_path
                .ok_or_else(|| ConfigurationError::MissingRequired {
                    field: "token_cache_path".to_string(),
                })?;
        if token_cache_path.as_os_str().is_empty() {
            return Err(ConfigurationError::MissingRequired {
                field: "token_cache_path".to_string(),
            });
        }

        if let Some(endpoint) = &self.hist_endpoint {
            validate_url(endpoint)?;
        }
        if let Some(base_url) = &self.base_url {
            validate_url(base_url)?;
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            });
        }

        Ok(AnalyticsConfig {
            auth_url,
            credentials: ClientCredentials {
                client_id,
                client_secret,
                audience: self.audience,
            },
            token_cache_path,
            hist_endpoint: self.hist_endpoint,
            base_url: self.base_url,
            api_version_header: self
                .api_version_header
                .unwrap_or_else(|| DEFAULT_API_VERSION_HEADER.to_string()),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            timeout,
            max_error_body_bytes: self
                .max_error_body_bytes
                .unwrap_or(DEFAULT_MAX_ERROR_BODY_BYTES),
            max_response_bytes: self
                .max_response_bytes
                .unwrap_or(DEFAULT_MAX_RESPONSE_BYTES),
            endpoints: self.endpoints,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigurationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigurationError::MissingRequired {
            field: field.to_string(),
        }),
    }
}

fn validate_url(raw: &str) -> Result<(), ConfigurationError> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
            message: e.to_string(),
        })
}

/// Create a new analytics configuration builder.
pub fn analytics_config() -> AnalyticsConfigBuilder {
    AnalyticsConfigBuilder::new()
}
