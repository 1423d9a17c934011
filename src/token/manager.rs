//! Token Manager
//!
//! Owns the in-memory token slot, decides expiry, and refreshes through the
//! client-credentials flow with write-through to storage.
//!
//! Refresh is single-flight: callers that queue behind an in-flight refresh
//! receive its outcome instead of issuing their own authorization request.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::flows::ClientCredentialsFlow;
use crate::telemetry::secret_hint;
use crate::token::TokenStorage;
use crate::types::Token;

/// Token manager interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get a non-expired token, loading or refreshing if necessary.
    async fn get_valid_token(&self) -> AnalyticsResult<Token>;

    /// In-memory token, if any, without I/O or expiry checks.
    async fn cached_token(&self) -> Option<Token>;
}

#[derive(Default)]
struct TokenSlot {
    token: Option<Token>,
    last_failure: Option<AnalyticsError>,
}

impl TokenSlot {
    fn valid_token(&self) -> Option<Token> {
        self.token.as_ref().filter(|t| !t.is_expired()).cloned()
    }
}

/// Default token manager implementation.
pub struct DefaultTokenManager<F: ClientCredentialsFlow, S: TokenStorage> {
    flow: Arc<F>,
    storage: Arc<S>,
    slot: RwLock<TokenSlot>,
    // Bumped under the write lock after every load adoption or refresh attempt.
    generation: AtomicU64,
}

impl<F: ClientCredentialsFlow, S: TokenStorage> DefaultTokenManager<F, S> {
    /// Create new token manager.
    pub fn new(flow: Arc<F>, storage: Arc<S>) -> Self {
        Self {
            flow,
            storage,
            slot: RwLock::new(TokenSlot::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Storage backing this manager.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn refresh(&self, slot: &mut TokenSlot) -> AnalyticsResult<Token> {
        debug!("Refreshing access token");

        let token = match self.flow.request_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Token refresh failed");
                return Err(self.record_failure(slot, e));
            }
        };

        if let Err(e) = self.storage.save(&token).await {
            warn!(error = %e, "Failed to persist refreshed token");
            return Err(self.record_failure(slot, e.into()));
        }

        info!(
            token = %secret_hint(token.secret()),
            expires_at = %token.expires_at(),
            "Access token refreshed"
        );

        slot.token = Some(token.clone());
        slot.last_failure = None;
        self.bump_generation();
        Ok(token)
    }

    fn record_failure(&self, slot: &mut TokenSlot, error: AnalyticsError) -> AnalyticsError {
        slot.last_failure = Some(error.clone());
        self.bump_generation();
        error
    }
}

#[async_trait]
impl<F: ClientCredentialsFlow, S: TokenStorage> TokenManager for DefaultTokenManager<F, S> {
    async fn get_valid_token(&self) -> AnalyticsResult<Token> {
        let observed = self.generation.load(Ordering::SeqCst);

        if let Some(token) = self.slot.read().await.valid_token() {
            return Ok(token);
        }

        let mut slot = self.slot.write().await;

        if let Some(token) = slot.valid_token() {
            return Ok(token);
        }

        // A refresh finished while this caller was waiting; share its failure.
        if self.generation.load(Ordering::SeqCst) != observed {
            if let Some(error) = &slot.last_failure {
                return Err(error.clone());
            }
        }

        match self.storage.load().await {
            Ok(token) if !token.is_expired() => {
                debug!(token = %secret_hint(token.secret()), "Adopted cached token");
                slot.token = Some(token.clone());
                slot.last_failure = None;
                self.bump_generation();
                return Ok(token);
            }
            Ok(_) => debug!("Cached token expired"),
            Err(e) => debug!(error = %e, "No usable cached token"),
        }

        self.refresh(&mut slot).await
    }

    async fn cached_token(&self) -> Option<Token> {
        self.slot.read().await.token.clone()
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockTokenManager;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock token manager for testing.
    ///
    /// Serves queued outcomes in order, then a fixed long-lived token.
    #[derive(Default)]
    pub struct MockTokenManager {
        outcomes: Mutex<VecDeque<AnalyticsResult<Token>>>,
        current: Mutex<Option<Token>>,
        calls: Mutex<usize>,
    }

    impl MockTokenManager {
        /// Create new mock token manager.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a token to return.
        pub fn queue_token(&self, token: Token) -> &Self {
            self.outcomes.lock().unwrap().push_back(Ok(token));
            self
        }

        /// Queue an error to return.
        pub fn queue_error(&self, error: impl Into<AnalyticsError>) -> &Self {
            self.outcomes.lock().unwrap().push_back(Err(error.into()));
            self
        }

        /// Number of `get_valid_token` calls.
        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TokenManager for MockTokenManager {
        async fn get_valid_token(&self) -> AnalyticsResult<Token> {
            *self.calls.lock().unwrap() += 1;

            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Token::new("mock-access-token", Utc::now(), 3600)));

            if let Ok(token) = &outcome {
                *self.current.lock().unwrap() = Some(token.clone());
            }
            outcome
        }

        async fn cached_token(&self) -> Option<Token> {
            self.current.lock().unwrap().clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, PersistenceError};
    use crate::flows::MockClientCredentialsFlow;
    use crate::token::MockTokenStorage;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn manager(
        flow: MockClientCredentialsFlow,
        storage: MockTokenStorage,
    ) -> (
        Arc<DefaultTokenManager<MockClientCredentialsFlow, MockTokenStorage>>,
        Arc<MockClientCredentialsFlow>,
        Arc<MockTokenStorage>,
    ) {
        let flow = Arc::new(flow);
        let storage = Arc::new(storage);
        let manager = Arc::new(DefaultTokenManager::new(flow.clone(), storage.clone()));
        (manager, flow, storage)
    }

    #[tokio::test]
    async fn test_refresh_when_empty() {
        let (manager, flow, storage) =
            manager(MockClientCredentialsFlow::new(), MockTokenStorage::new());

        let token = manager.get_valid_token().await.unwrap();
        assert_eq!(token.secret(), "mock-token-1");
        assert_eq!(flow.call_count(), 1);
        assert_eq!(storage.get_save_history(), vec![token.clone()]);
        assert_eq!(manager.cached_token().await, Some(token));
    }

    #[tokio::test]
    async fn test_valid_in_memory_token_skips_io() {
        let (manager, flow, storage) =
            manager(MockClientCredentialsFlow::new(), MockTokenStorage::new());

        let first = manager.get_valid_token().await.unwrap();
        let second = manager.get_valid_token().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(flow.call_count(), 1);
        assert_eq!(storage.load_count(), 1);
    }

    #[tokio::test]
    async fn test_adopts_valid_stored_token() {
        let stored = Token::new("from-disk", Utc::now(), 3600);
        let (manager, flow, _storage) = manager(
            MockClientCredentialsFlow::new(),
            MockTokenStorage::new().with_token(stored.clone()),
        );

        assert_eq!(manager.get_valid_token().await.unwrap(), stored);
        assert_eq!(flow.call_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_stored_token_triggers_refresh() {
        let expired = Token::new("stale", Utc::now() - ChronoDuration::seconds(7200), 3600);
        let (manager, flow, _storage) = manager(
            MockClientCredentialsFlow::new(),
            MockTokenStorage::new().with_token(expired),
        );

        assert_eq!(manager.get_valid_token().await.unwrap().secret(), "mock-token-1");
        assert_eq!(flow.call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_in_memory_token_triggers_refresh() {
        let (manager, flow, _storage) = manager(
            MockClientCredentialsFlow::new().with_ttl(0),
            MockTokenStorage::new(),
        );

        manager.get_valid_token().await.unwrap();
        let second = manager.get_valid_token().await.unwrap();

        assert_eq!(second.secret(), "mock-token-2");
        assert_eq!(flow.call_count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_refresh() {
        let storage = MockTokenStorage::new();
        storage.set_load_error(PersistenceError::Corrupt {
            path: "token.json".to_string(),
            message: "expected value".to_string(),
        });
        let (manager, flow, _storage) = manager(MockClientCredentialsFlow::new(), storage);

        assert!(manager.get_valid_token().await.is_ok());
        assert_eq!(flow.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_state_untouched() {
        let flow = MockClientCredentialsFlow::new();
        flow.queue_error(AuthError::Rejected {
            status: 401,
            message: "access_denied".to_string(),
        });
        let (manager, _flow, storage) = manager(flow, MockTokenStorage::new());

        let err = manager.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AnalyticsError::Auth(AuthError::Rejected { status: 401, .. })));
        assert!(manager.cached_token().await.is_none());
        assert!(storage.get_save_history().is_empty());

        // a later call retries
        assert!(manager.get_valid_token().await.is_ok());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory_unchanged() {
        let storage = MockTokenStorage::new();
        storage.set_save_error(PersistenceError::WriteFailed {
            path: "token.json".to_string(),
            message: "read-only file system".to_string(),
        });
        let (manager, _flow, _storage) = manager(MockClientCredentialsFlow::new(), storage);

        let err = manager.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AnalyticsError::Persistence(PersistenceError::WriteFailed { .. })));
        assert!(manager.cached_token().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let (manager, flow, _storage) = manager(
            MockClientCredentialsFlow::new().with_delay(Duration::from_millis(50)),
            MockTokenStorage::new(),
        );

        let calls = (0..10).map(|_| {
            let manager = manager.clone();
            async move { manager.get_valid_token().await }
        });
        let results = futures::future::join_all(calls).await;

        let first = results[0].as_ref().unwrap().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap(), &first);
        }
        assert_eq!(flow.call_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let flow = MockClientCredentialsFlow::new().with_delay(Duration::from_millis(50));
        flow.queue_error(AuthError::Rejected {
            status: 503,
            message: "unavailable".to_string(),
        });
        let (manager, flow, _storage) = manager(flow, MockTokenStorage::new());

        let calls = (0..10).map(|_| {
            let manager = manager.clone();
            async move { manager.get_valid_token().await }
        });
        let results = futures::future::join_all(calls).await;

        for result in &results {
            let err = result.as_ref().unwrap_err();
            assert_eq!(
                err.to_string(),
                "Authorization error: Authorization server rejected the request (HTTP 503): unavailable"
            );
        }
        assert_eq!(flow.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_state_untouched() {
        let (manager, flow, storage) = manager(
            MockClientCredentialsFlow::new().with_delay(Duration::from_millis(200)),
            MockTokenStorage::new(),
        );

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), manager.get_valid_token()).await;
        assert!(cancelled.is_err());
        assert!(manager.cached_token().await.is_none());
        assert!(storage.get_save_history().is_empty());

        let token = manager.get_valid_token().await.unwrap();
        assert_eq!(token.secret(), "mock-token-2");
        assert_eq!(flow.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_token_manager() {
        let manager = MockTokenManager::new();
        manager.queue_error(AuthError::MalformedResponse {
            message: "bad".to_string(),
        });

        assert!(manager.get_valid_token().await.is_err());
        assert!(manager.cached_token().await.is_none());
        assert_eq!(
            manager.get_valid_token().await.unwrap().secret(),
            "mock-access-token"
        );
        assert_eq!(manager.call_count(), 2);
    }
}
