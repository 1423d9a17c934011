//! Token Types
//!
//! Bearer token state, authorization server response, and the canonical
//! persisted cache record.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Current version of the persisted token record.
pub const TOKEN_SCHEMA_VERSION: u32 = 1;

/// Token response from the authorization server.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Token type, when the server reports one.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Bearer token with expiry tracking.
///
/// Replaced wholesale on refresh; never partially updated.
#[derive(Clone)]
pub struct Token {
    value: SecretString,
    created_at: DateTime<Utc>,
    ttl_secs: i64,
}

impl Token {
    /// Create new token.
    pub fn new(value: impl Into<String>, created_at: DateTime<Utc>, ttl_secs: i64) -> Self {
        Self {
            value: SecretString::new(value.into()),
            created_at,
            ttl_secs,
        }
    }

    /// Get token value (for Authorization header).
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Expiry instant. Saturates at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        expiry_instant(self.created_at, self.ttl_secs).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Check expiry against `now`. The expiry instant itself counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value.expose_secret())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.secret() == other.secret()
            && self.created_at == other.created_at
            && self.ttl_secs == other.ttl_secs
    }
}

impl Eq for Token {}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// `created_at + ttl_secs`, or `None` when the lifetime is negative or
/// overflows the calendar.
pub fn expiry_instant(created_at: DateTime<Utc>, ttl_secs: i64) -> Option<DateTime<Utc>> {
    if ttl_secs < 0 {
        return None;
    }
    Duration::try_seconds(ttl_secs).and_then(|ttl| created_at.checked_add_signed(ttl))
}

fn default_schema_version() -> u32 {
    TOKEN_SCHEMA_VERSION
}

/// On-disk token cache record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    /// Schema version. Records written before versioning read as 1.
    #[serde(default = "default_schema_version")]
    pub version: u32,
    pub access_token: String,
    pub expires_in: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&Token> for PersistedToken {
    fn from(token: &Token) -> Self {
        Self {
            version: TOKEN_SCHEMA_VERSION,
            access_token: token.secret().to_string(),
            expires_in: token.ttl_secs,
            created_at: token.created_at,
        }
    }
}

impl TryFrom<PersistedToken> for Token {
    type Error = String;

    fn try_from(record: PersistedToken) -> Result<Self, Self::Error> {
        if record.version != TOKEN_SCHEMA_VERSION {
            return Err(format!("unsupported schema version {}", record.version));
        }
        if record.access_token.is_empty() {
            return Err("empty access_token".to_string());
        }
        if record.expires_in < 0 {
            return Err(format!("negative expires_in {}", record.expires_in));
        }
        if expiry_instant(record.created_at, record.expires_in).is_none() {
            return Err(format!("expires_in {} out of range", record.expires_in));
        }
        Ok(Token::new(record.access_token, record.created_at, record.expires_in))
    }
}
