//! Authorization Flows
//!
//! - **Client Credentials Flow** (RFC 6749 Section 4.4): machine-to-machine token issuance

pub mod client_credentials;

pub use client_credentials::{ClientCredentialsFlow, ClientCredentialsFlowImpl};

#[cfg(any(test, feature = "mocks"))]
pub use client_credentials::MockClientCredentialsFlow;
