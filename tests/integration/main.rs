//! Integration tests using WireMock
//!
//! These tests run the real transport, token manager, and file cache
//! against a mock authorization server and analytics API.

mod client;
mod token_lifecycle;

use kpi_analytics_integration::{analytics_config, AnalyticsConfigBuilder};
use serde_json::json;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const HIST_PATH: &str = "/api/v5/singlesensors/data/hist";

/// Builder pointing at the mock server with the token cache in `cache_dir`.
pub fn test_config(server: &MockServer, cache_dir: &Path) -> AnalyticsConfigBuilder {
    analytics_config()
        .auth_url(format!("{}{}", server.uri(), TOKEN_PATH))
        .client_id("test-client")
        .client_secret("test-secret")
        .audience("https://analytics.example.com")
        .token_cache_path(cache_dir.join("token.json"))
        .hist_endpoint(format!("{}{}", server.uri(), HIST_PATH))
}

/// Successful token endpoint response.
pub fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "expires_in": 86400,
        "token_type": "Bearer"
    }))
}

/// Mock for the token endpoint.
pub fn token_mock(response: ResponseTemplate) -> Mock {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(response)
}

/// Historical response body with one waiting-time column.
pub fn hist_body() -> serde_json::Value {
    json!({
        "configs": [{
            "id": "cfg-1",
            "providerId": "provider-1",
            "data_source_type": "zone",
            "data_source_name": "Security",
            "kpi_type": "PREDICTED_WAITING_TIME",
            "data_type": "INTEGER",
            "unit": "SECONDS",
            "aggregation_type": "AVG"
        }],
        "items": [
            {"timestamp": "2025-06-15T15:30:00Z", "values": ["120"]},
            {"timestamp": 1750000000, "values": [null]}
        ]
    })
}

/// Mock for the historical data endpoint.
pub fn hist_mock(response: ResponseTemplate) -> Mock {
    Mock::given(method("GET"))
        .and(path(HIST_PATH))
        .respond_with(response)
}
