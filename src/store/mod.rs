//! Token store: keyed persistence for [`CachedToken`] records.
//!
//! Backends:
//! - `memory`: process-local map, the lock doubles as the transaction
//! - `sqlite`: `sqlx` pool, shareable between processes through one file

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::cache::token::CachedToken;
use crate::config::sources::StoreConfig;

pub use memory::MemoryTokenStore;
pub use sqlite::SqliteTokenStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record for '{api_name}': {reason}")]
    Corrupt { api_name: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was missing or expired and now holds the candidate.
    Written,
    /// A record valid at `now` was already present and kept.
    Skipped,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find(&self, api_name: &str) -> Result<Option<CachedToken>, StoreError>;

    /// Transactional read-modify-write: re-read the record for
    /// `candidate.api_name` and install `candidate` only if the stored one
    /// is missing or not valid at `now`.
    async fn upsert_if_stale(&self, candidate: &CachedToken, now: DateTime<Utc>) -> Result<UpsertOutcome, StoreError>;

    /// Unconditional insert-or-update keyed by `api_name`.
    async fn upsert(&self, token: &CachedToken) -> Result<(), StoreError>;
}

/// Open (and migrate) the configured backend.
pub async fn from_config(cfg: &StoreConfig) -> Result<Arc<dyn TokenStore>, StoreError> {
    match cfg {
        StoreConfig::Memory => {
            info!("using in-memory token store");
            Ok(Arc::new(MemoryTokenStore::new()))
        }
        StoreConfig::Sqlite { url, max_connections } => {
            let store = SqliteTokenStore::connect(url, *max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}
