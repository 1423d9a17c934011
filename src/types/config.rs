//! Configuration Types
//!
//! Explicit configuration passed into constructors. Built with
//! [`crate::builders::AnalyticsConfigBuilder`].

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigurationError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default size of the error body snippet kept for non-success responses.
pub const DEFAULT_MAX_ERROR_BODY_BYTES: usize = 1024;

/// Default cap on a successful response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Default API version header name.
pub const DEFAULT_API_VERSION_HEADER: &str = "Xovis-Api-Version";

/// Default API version header value.
pub const DEFAULT_API_VERSION: &str = "1";

/// Client-credentials grant settings.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Audience requested from the authorization server.
    pub audience: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .finish()
    }
}

/// A named API endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub name: String,
    pub address: String,
}

/// Ordered set of named API endpoints.
#[derive(Clone, Debug, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<ApiEndpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. A later registration under the same name wins.
    pub fn insert(&mut self, name: impl Into<String>, address: impl Into<String>) {
        let name = name.into();
        let address = address.into();
        match self.endpoints.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.address = address,
            None => self.endpoints.push(ApiEndpoint { name, address }),
        }
    }

    /// Address registered under `name`.
    pub fn address(&self, name: &str) -> Result<&str, ConfigurationError> {
        self.endpoints
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.address.as_str())
            .ok_or_else(|| ConfigurationError::UnknownEndpoint {
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiEndpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Human-readable listing, one endpoint per line.
    pub fn describe(&self) -> String {
        let mut out = String::from("Endpoints list:\n");
        for endpoint in &self.endpoints {
            out.push_str(&format!(
                "Name: {} -- Address: {}\n",
                endpoint.name, endpoint.address
            ));
        }
        out
    }
}

/// Analytics client configuration.
#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    /// Authorization server token URL.
    pub auth_url: String,
    /// Client credentials.
    pub credentials: ClientCredentials,
    /// Token cache file.
    pub token_cache_path: PathBuf,
    /// Historical data endpoint.
    pub hist_endpoint: Option<String>,
    /// Base URL that named endpoints are resolved against.
    pub base_url: Option<String>,
    /// API version header name.
    pub api_version_header: String,
    /// API version header value.
    pub api_version: String,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Bytes of a non-success body kept in errors.
    pub max_error_body_bytes: usize,
    /// Largest accepted success body.
    pub max_response_bytes: usize,
    /// Named endpoints.
    pub endpoints: EndpointRegistry,
}

impl AnalyticsConfig {
    /// Historical data endpoint, required by the hist fetch.
    pub fn hist_endpoint(&self) -> Result<&str, ConfigurationError> {
        self.hist_endpoint
            .as_deref()
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "hist_endpoint".to_string(),
            })
    }

    /// Full URL of a named endpoint.
    ///
    /// Absolute addresses are returned as-is; relative ones are joined to
    /// `base_url`.
    pub fn endpoint_url(&self, name: &str) -> Result<String, ConfigurationError> {
        let address = self.endpoints.address(name)?;
        if address.starts_with("http://") || address.starts_with("https://") {
            return Ok(address.to_string());
        }

        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "base_url".to_string(),
            })?;
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            address.trim_start_matches('/')
        ))
    }
}
