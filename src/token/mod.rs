//! Token Management
//!
//! Token lifecycle: durable storage plus the single-flight manager.

pub mod manager;
pub mod storage;

pub use manager::{DefaultTokenManager, TokenManager};
pub use storage::{FileTokenStorage, InMemoryTokenStorage, TokenStorage};

#[cfg(any(test, feature = "mocks"))]
pub use manager::MockTokenManager;
#[cfg(any(test, feature = "mocks"))]
pub use storage::MockTokenStorage;
