//! KPI Analytics Integration
//!
//! Client for a time-series KPI analytics API secured with the OAuth2
//! client-credentials grant.
//!
//! # Features
//!
//! - Client Credentials Flow (RFC 6749 Section 4.4) with a JSON request body
//! - Durable, atomically written token cache with expiry tracking
//! - Single-flight token refresh shared by concurrent callers
//! - Authenticated requests with Bearer, Basic, or API key credentials
//! - Lenient decoding of numeric values and epoch/RFC 3339 timestamps
//! - Columnar historical responses indexed by KPI type
//!
//! # Example
//!
//! ```rust,ignore
//! use kpi_analytics_integration::{AnalyticsClient, AnalyticsConfigBuilder, HistQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyticsConfigBuilder::from_env()?.build()?;
//!     let client = AnalyticsClient::new(config)?;
//!
//!     let query = HistQuery::new("2025-06-15T00:00:00Z", "2025-06-16T00:00:00Z")
//!         .granularity("PT15M");
//!     let response = client.fetch_hist_data(&query).await?;
//!
//!     let waits = response.get_values_by_kpi_type("PREDICTED_WAITING_TIME")?;
//!     println!("{:?}", waits);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, token, and historical data structures
//! - `error`: error hierarchy, one enum per failure category
//! - `core`: HTTP transport
//! - `flows`: client-credentials flow
//! - `token`: token storage and lifecycle management
//! - `decode`: flexible numeric and timestamp decoding
//! - `columnar`: indexed historical response
//! - `builders`: fluent configuration builder
//! - `client`: authenticated request client
//! - `resilience`: opt-in caller-level retry
//! - `telemetry`: tracing subscriber setup
//!
//! Mock implementations of the transport, flow, storage, and token manager
//! are available with the `mocks` feature.

pub mod builders;
pub mod client;
pub mod columnar;
pub mod core;
pub mod decode;
pub mod error;
pub mod flows;
pub mod resilience;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{build_url, AnalyticsClient, AuthScheme, DefaultAnalyticsTokenManager};

// Re-export builders
pub use builders::{analytics_config, AnalyticsConfigBuilder};

// Re-export errors
pub use error::{
    AnalyticsError, AnalyticsResult, AuthError, ConfigurationError, DecodeError, LookupError,
    NetworkError, PersistenceError,
};

// Re-export types
pub use types::{
    AnalyticsConfig, ApiEndpoint, ClientCredentials, ColumnConfig, EndpointRegistry, HistQuery,
    Item, PersistedToken, Token, TokenResponse,
};

pub use columnar::HistResponse;
pub use decode::{parse_flexible_int, parse_flexible_timestamp, FlexibleInt, FlexibleTimestamp};

// Re-export core components
pub use core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};

// Re-export flows
pub use flows::{ClientCredentialsFlow, ClientCredentialsFlowImpl};

// Re-export token management
pub use token::{
    DefaultTokenManager, FileTokenStorage, InMemoryTokenStorage, TokenManager, TokenStorage,
};

// Re-export resilience
pub use resilience::{RetryConfig, RetryExecutor, RetryStats};

// Re-export telemetry
pub use telemetry::{init_tracing, secret_hint, LogFormat};

#[cfg(any(test, feature = "mocks"))]
pub use core::MockHttpTransport;
#[cfg(any(test, feature = "mocks"))]
pub use flows::MockClientCredentialsFlow;
#[cfg(any(test, feature = "mocks"))]
pub use token::{MockTokenManager, MockTokenStorage};
