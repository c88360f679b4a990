use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::cache::token::CachedToken;
use crate::store::{StoreError, TokenStore, UpsertOutcome};

/// In-process store: api_name -> token. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<HashMap<String, CachedToken>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records written so far, seeding included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find(&self, api_name: &str) -> Result<Option<CachedToken>, StoreError> {
        let map = self.inner.lock().await;
        Ok(map.get(api_name).cloned())
    }

    async fn upsert_if_stale(&self, candidate: &CachedToken, now: DateTime<Utc>) -> Result<UpsertOutcome, StoreError> {
        // holding the lock across read and write serializes refresh races
        let mut map = self.inner.lock().await;
        if map.get(&candidate.api_name).is_some_and(|stored| stored.is_valid_at(now)) {
            return Ok(UpsertOutcome::Skipped);
        }
        map.insert(candidate.api_name.to_owned(), candidate.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(UpsertOutcome::Written)
    }

    async fn upsert(&self, token: &CachedToken) -> Result<(), StoreError> {
        let mut map = self.inner.lock().await;
        map.insert(token.api_name.to_owned(), token.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
