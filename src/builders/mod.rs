//! Builders
//!
//! Fluent builder for the analytics configuration.

pub mod config;

pub use config::{analytics_config, AnalyticsConfigBuilder};
