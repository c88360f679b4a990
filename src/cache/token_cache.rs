//! Store-backed token cache.
//!
//! Every lookup consults the [`TokenStore`]; nothing is cached in process
//! memory. A miss mints a token from the api's [`TokenIssuer`] and persists
//! it with [`TokenStore::upsert_if_stale`], so concurrent refreshers (in this
//! process or in others sharing the store) converge on one stored record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::token::{AccessToken, CachedToken};
use crate::error::TokenCacheError;
use crate::helpers::time::{expires_at_with_margin, Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::sources::TokenIssuer;
use crate::store::{TokenStore, UpsertOutcome};
use crate::utils::constants::{
    DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_TTL_SECS, OUTCOME_SKIPPED, OUTCOME_WRITTEN, RESULT_HIT, RESULT_MISS,
};

/// How an issuer-reported lifetime turns into a stored expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Subtracted from the lifetime so the token never expires mid-use.
    pub safety_margin_seconds: u64,
    /// Lifetime assumed when the issuer does not report one.
    pub default_ttl_seconds: u64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            safety_margin_seconds: DEFAULT_SAFETY_MARGIN_SECS,
            default_ttl_seconds: DEFAULT_TTL_SECS,
        }
    }
}

struct RegisteredApi {
    issuer: Arc<dyn TokenIssuer>,
    policy: ExpiryPolicy,
}

struct Inner {
    store: Arc<dyn TokenStore>,
    apis: HashMap<String, RegisteredApi>,
    clock: Arc<dyn Clock>,
    coalesce_refreshes: bool,
    refresh_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Cheap to clone; clones share store, issuers and refresh locks.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<Inner>,
}

pub struct TokenCacheBuilder {
    store: Arc<dyn TokenStore>,
    apis: HashMap<String, RegisteredApi>,
    clock: Arc<dyn Clock>,
    coalesce_refreshes: bool,
}

impl TokenCacheBuilder {
    pub fn register(
        mut self,
        api_name: impl Into<String>,
        issuer: Arc<dyn TokenIssuer>,
        policy: ExpiryPolicy,
    ) -> Self {
        self.apis.insert(api_name.into(), RegisteredApi { issuer, policy });
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serialize refreshes of the same api inside this process so that
    /// concurrent misses mint once. On by default.
    pub fn coalesce_refreshes(mut self, enabled: bool) -> Self {
        self.coalesce_refreshes = enabled;
        self
    }

    pub fn build(self) -> TokenCache {
        TokenCache {
            inner: Arc::new(Inner {
                store: self.store,
                apis: self.apis,
                clock: self.clock,
                coalesce_refreshes: self.coalesce_refreshes,
                refresh_locks: StdMutex::new(HashMap::new()),
            }),
        }
    }
}

impl TokenCache {
    pub fn builder(store: Arc<dyn TokenStore>) -> TokenCacheBuilder {
        TokenCacheBuilder {
            store,
            apis: HashMap::new(),
            clock: Arc::new(SystemClock),
            coalesce_refreshes: true,
        }
    }

    pub fn api_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.apis.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, api_name: &str) -> bool {
        self.inner.apis.contains_key(api_name)
    }

    /// Return a token valid right now, minting one if the stored token is
    /// missing or expired.
    ///
    /// # Errors
    ///
    /// - [`TokenCacheError::EmptyApiName`] / [`TokenCacheError::UnknownApi`]
    ///   before any I/O.
    /// - [`TokenCacheError::Unavailable`] when the issuer cannot be reached
    ///   or refuses; nothing is written.
    /// - [`TokenCacheError::Malformed`] when the issuer answers with an
    ///   unusable body.
    /// - [`TokenCacheError::Store`] on any persistence failure.
    pub async fn get_access_token(&self, api_name: &str) -> Result<AccessToken, TokenCacheError> {
        if api_name.trim().is_empty() {
            return Err(TokenCacheError::EmptyApiName);
        }
        let api = self
            .inner
            .apis
            .get(api_name)
            .ok_or_else(|| TokenCacheError::UnknownApi(api_name.to_owned()))?;
        let metrics = get_metrics().await;

        if let Some(token) = self.find_valid(api_name).await? {
            metrics.cache_lookups.with_label_values(&[api_name, RESULT_HIT]).inc();
            debug!(api = %api_name, expires_at = %token.expires_at, "serving stored token");
            return Ok(token);
        }
        metrics.cache_lookups.with_label_values(&[api_name, RESULT_MISS]).inc();

        if !self.inner.coalesce_refreshes {
            return self.refresh(api_name, api).await;
        }

        let lock = self.refresh_lock(api_name);
        let _guard = lock.lock().await;
        // another task may have refreshed while we waited for the lock
        if let Some(token) = self.find_valid(api_name).await? {
            debug!(api = %api_name, "token refreshed by a concurrent caller");
            return Ok(token);
        }
        self.refresh(api_name, api).await
    }

    /// Nullable variant: `Ok(None)` when the issuer is unavailable right now.
    /// Every other failure is still an error.
    pub async fn try_get_access_token(&self, api_name: &str) -> Result<Option<AccessToken>, TokenCacheError> {
        match self.get_access_token(api_name).await {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.is_unavailable() => {
                warn!(api = %api_name, error = %e, "no token obtainable right now");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_valid(&self, api_name: &str) -> Result<Option<AccessToken>, TokenCacheError> {
        let now = self.inner.clock.now();
        Ok(self
            .inner
            .store
            .find(api_name)
            .await?
            .filter(|record| record.is_valid_at(now))
            .map(AccessToken::cached))
    }

    async fn refresh(&self, api_name: &str, api: &RegisteredApi) -> Result<AccessToken, TokenCacheError> {
        let metrics = get_metrics().await;
        metrics.mint_requests.with_label_values(&[api_name]).inc();
        let start = Instant::now();

        let issued = api.issuer.mint().await;
        metrics.mint_duration.with_label_values(&[api_name]).observe(start.elapsed().as_secs_f64());
        let issued = issued.map_err(|e| {
            metrics.mint_failures.with_label_values(&[api_name, e.reason()]).inc();
            warn!(api = %api_name, error = %e, "token mint failed");
            TokenCacheError::from_issuer(api_name, e)
        })?;

        let minted_at = self.inner.clock.now();
        let ttl = issued.reported_ttl().unwrap_or(api.policy.default_ttl_seconds);
        let expires_at = expires_at_with_margin(minted_at, ttl, api.policy.safety_margin_seconds);
        let record = CachedToken::new(api_name, issued.access_token, expires_at);

        let now = self.inner.clock.now();
        if !record.is_valid_at(now) {
            warn!(
                api = %api_name,
                ttl_seconds = ttl,
                safety_margin_seconds = api.policy.safety_margin_seconds,
                "issuer lifetime does not exceed safety margin, token not stored"
            );
            return Ok(AccessToken::minted(record));
        }

        let outcome = self.inner.store.upsert_if_stale(&record, now).await?;
        let label = match outcome {
            UpsertOutcome::Written => OUTCOME_WRITTEN,
            UpsertOutcome::Skipped => OUTCOME_SKIPPED,
        };
        metrics.store_writes.with_label_values(&[api_name, label]).inc();
        if outcome == UpsertOutcome::Written {
            metrics.token_expiry_unix.with_label_values(&[api_name]).set(expires_at.timestamp());
        }
        info!(api = %api_name, expires_at = %expires_at, outcome = label, "minted new token");

        Ok(AccessToken::minted(record))
    }

    fn refresh_lock(&self, api_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .inner
            .refresh_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(api_name.to_owned()).or_default().clone()
    }
}
