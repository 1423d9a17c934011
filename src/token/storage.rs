//! Token Storage
//!
//! Durable storage of the single cached bearer token.

use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::PersistenceError;
use crate::types::{PersistedToken, Token};

/// Token storage interface.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Load the cached token.
    async fn load(&self) -> Result<Token, PersistenceError>;

    /// Save a token, replacing any previous record.
    async fn save(&self, token: &Token) -> Result<(), PersistenceError>;
}

/// File-backed token storage.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the target, so readers never see a partial record.
#[derive(Clone, Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Create storage for the given cache file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn read_record(path: &Path) -> Result<Token, PersistenceError> {
        let location = path.display().to_string();

        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PersistenceError::NotFound {
                path: location.clone(),
            },
            _ => PersistenceError::ReadFailed {
                path: location.clone(),
                message: e.to_string(),
            },
        })?;

        let record: PersistedToken =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
                path: location.clone(),
                message: e.to_string(),
            })?;

        Token::try_from(record).map_err(|message| PersistenceError::Corrupt {
            path: location,
            message,
        })
    }

    fn write_record(path: &Path, record: &PersistedToken) -> Result<(), PersistenceError> {
        let location = path.display().to_string();
        let write_failed = |e: std::io::Error| PersistenceError::WriteFailed {
            path: location.clone(),
            message: e.to_string(),
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_failed)?;

        let json = serde_json::to_vec_pretty(record).map_err(|e| PersistenceError::WriteFailed {
            path: location.clone(),
            message: e.to_string(),
        })?;

        // NamedTempFile is created owner-only (0600) on unix.
        let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(write_failed)?;
        file.write_all(&json).map_err(write_failed)?;
        file.as_file().sync_all().map_err(write_failed)?;
        file.persist(path).map_err(|e| write_failed(e.error))?;

        Ok(())
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn load(&self) -> Result<Token, PersistenceError> {
        let path = self.path.clone();
        let token = tokio::task::spawn_blocking(move || Self::read_record(&path))
            .await
            .map_err(|e| PersistenceError::ReadFailed {
                path: self.display(),
                message: e.to_string(),
            })??;

        debug!(path = %self.path.display(), "Loaded cached token");
        Ok(token)
    }

    async fn save(&self, token: &Token) -> Result<(), PersistenceError> {
        let path = self.path.clone();
        let record = PersistedToken::from(token);
        tokio::task::spawn_blocking(move || Self::write_record(&path, &record))
            .await
            .map_err(|e| PersistenceError::WriteFailed {
                path: self.display(),
                message: e.to_string(),
            })??;

        debug!(path = %self.path.display(), "Saved token to cache");
        Ok(())
    }
}

/// In-memory token storage implementation.
#[derive(Default)]
pub struct InMemoryTokenStorage {
    token: Mutex<Option<Token>>,
}

impl InMemoryTokenStorage {
    /// Create new in-memory token storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn load(&self) -> Result<Token, PersistenceError> {
        self.token
            .lock()
            .map_err(|e| PersistenceError::ReadFailed {
                path: "memory".to_string(),
                message: e.to_string(),
            })?
            .clone()
            .ok_or_else(|| PersistenceError::NotFound {
                path: "memory".to_string(),
            })
    }

    async fn save(&self, token: &Token) -> Result<(), PersistenceError> {
        *self.token.lock().map_err(|e| PersistenceError::WriteFailed {
            path: "memory".to_string(),
            message: e.to_string(),
        })? = Some(token.clone());
        Ok(())
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockTokenStorage;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use super::*;

    /// Mock token storage for testing.
    #[derive(Default)]
    pub struct MockTokenStorage {
        token: Mutex<Option<Token>>,
        load_error: Mutex<Option<PersistenceError>>,
        save_error: Mutex<Option<PersistenceError>>,
        load_count: Mutex<usize>,
        save_history: Mutex<Vec<Token>>,
    }

    impl MockTokenStorage {
        /// Create new mock token storage.
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populate the stored token.
        pub fn with_token(self, token: Token) -> Self {
            *self.token.lock().unwrap() = Some(token);
            self
        }

        /// Make every load fail with `error`.
        pub fn set_load_error(&self, error: PersistenceError) -> &Self {
            *self.load_error.lock().unwrap() = Some(error);
            self
        }

        /// Make every save fail with `error`.
        pub fn set_save_error(&self, error: PersistenceError) -> &Self {
            *self.save_error.lock().unwrap() = Some(error);
            self
        }

        /// Number of loads attempted.
        pub fn load_count(&self) -> usize {
            *self.load_count.lock().unwrap()
        }

        /// Tokens successfully saved, oldest first.
        pub fn get_save_history(&self) -> Vec<Token> {
            self.save_history.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenStorage for MockTokenStorage {
        async fn load(&self) -> Result<Token, PersistenceError> {
            *self.load_count.lock().unwrap() += 1;

            if let Some(error) = self.load_error.lock().unwrap().clone() {
                return Err(error);
            }

            self.token
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| PersistenceError::NotFound {
                    path: "mock".to_string(),
                })
        }

        async fn save(&self, token: &Token) -> Result<(), PersistenceError> {
            if let Some(error) = self.save_error.lock().unwrap().clone() {
                return Err(error);
            }

            *self.token.lock().unwrap() = Some(token.clone());
            self.save_history.lock().unwrap().push(token.clone());
            Ok(())
        }
    }
}
