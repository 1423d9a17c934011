//! Core Components
//!
//! Shared HTTP plumbing for the token flow and the API client.

pub mod transport;

pub use transport::*;
