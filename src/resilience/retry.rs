//! Retry Logic
//!
//! Exponential backoff retry with jitter around a single operation.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::error::{AnalyticsError, AnalyticsResult};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        DEFAULT_RETRY_CONFIG
    }
}

/// Default retry configuration.
pub const DEFAULT_RETRY_CONFIG: RetryConfig = RetryConfig {
    max_attempts: 3,
    initial_delay: Duration::from_millis(100),
    max_delay: Duration::from_secs(10),
    multiplier: 2.0,
    jitter: 0.1,
};

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u32,
    pub successful_retries: u32,
    pub failed_operations: u32,
}

/// Retries operations whose errors report [`AnalyticsError::is_retryable`].
pub struct RetryExecutor {
    config: RetryConfig,
    stats: Mutex<RetryStats>,
}

impl RetryExecutor {
    /// Create new retry executor.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.config.max_delay.as_millis() as f64);

        let jitter_range = capped_delay * self.config.jitter;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }

    fn record(&self, update: impl FnOnce(&mut RetryStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    /// Execute an operation with retry logic.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> AnalyticsResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AnalyticsResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            self.record(|s| s.total_attempts += 1);

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        self.record(|s| s.successful_retries += 1);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !self.is_retryable(&error) || attempt + 1 >= max_attempts {
                        self.record(|s| s.failed_operations += 1);
                        return Err(error);
                    }

                    let delay = self.calculate_delay(attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after retryable error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Check if an error is retryable.
    pub fn is_retryable(&self, error: &AnalyticsError) -> bool {
        error.is_retryable()
    }

    /// Get retry statistics.
    pub fn get_stats(&self) -> RetryStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
