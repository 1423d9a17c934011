//! Resilience
//!
//! Opt-in, caller-level retry. Nothing in the client retries on its own.

pub mod retry;

pub use retry::{RetryConfig, RetryExecutor, RetryStats, DEFAULT_RETRY_CONFIG};
