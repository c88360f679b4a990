use chrono::{DateTime, Utc};
use serde::Serialize;

/// Persisted credential for one upstream API, keyed by `api_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub api_name: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(api_name: impl Into<String>, token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { api_name: api_name.into(), token: token.into(), expires_at }
    }

    /// Valid strictly before `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenOrigin {
    /// Served from the store without contacting the issuer.
    Cached,
    /// Minted by the issuer during this call.
    Minted,
}

/// Token handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub api_name: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub origin: TokenOrigin,
}

impl AccessToken {
    pub fn cached(record: CachedToken) -> Self {
        Self {
            api_name: record.api_name,
            value: record.token,
            expires_at: record.expires_at,
            origin: TokenOrigin::Cached,
        }
    }

    pub fn minted(record: CachedToken) -> Self {
        Self {
            api_name: record.api_name,
            value: record.token,
            expires_at: record.expires_at,
            origin: TokenOrigin::Minted,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}
