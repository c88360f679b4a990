// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::sync::Barrier;

use crate::cache::token::CachedToken;
use crate::cache::token_cache::{ExpiryPolicy, TokenCache};
use crate::helpers::time::ManualClock;
use crate::sources::{IssuedToken, IssuerError, TokenIssuer};
use crate::store::{StoreError, TokenStore, UpsertOutcome};

pub const API: &str = "IGDB";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

#[derive(Debug, Clone, Copy)]
pub enum StubBehavior {
    /// `token-{n}` with the given `expires_in`
    Issue(Option<u64>),
    Status(u16),
    Malformed,
}

/// Issuer double counting its mints.
pub struct StubIssuer {
    behavior: StubBehavior,
    mints: AtomicUsize,
    delay: Duration,
    barrier: Option<Arc<Barrier>>,
}

impl StubIssuer {
    pub fn new(behavior: StubBehavior) -> Self {
        Self { behavior, mints: AtomicUsize::new(0), delay: Duration::ZERO, barrier: None }
    }

    pub fn issuing(expires_in: Option<u64>) -> Arc<Self> {
        Arc::new(Self::new(StubBehavior::Issue(expires_in)))
    }

    /// Sleep inside every mint so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold every mint until `barrier` has been reached by all parties.
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn mints(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for StubIssuer {
    async fn mint(&self) -> Result<IssuedToken, IssuerError> {
        let n = self.mints.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.behavior {
            StubBehavior::Issue(expires_in) => Ok(IssuedToken { access_token: format!("token-{}", n), expires_in }),
            StubBehavior::Status(status) => Err(IssuerError::Status { status, body: "unavailable".to_owned() }),
            StubBehavior::Malformed => Err(IssuerError::Malformed("missing access_token".to_owned())),
        }
    }
}

/// Store whose backend is down.
pub struct UnreachableStore;

#[async_trait]
impl TokenStore for UnreachableStore {
    async fn find(&self, _api_name: &str) -> Result<Option<CachedToken>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_owned()))
    }

    async fn upsert_if_stale(&self, _candidate: &CachedToken, _now: DateTime<Utc>) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_owned()))
    }

    async fn upsert(&self, _token: &CachedToken) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_owned()))
    }
}

pub fn cache_with(store: Arc<dyn TokenStore>, issuer: Arc<dyn TokenIssuer>, clock: &ManualClock) -> TokenCache {
    TokenCache::builder(store)
        .register(API, issuer, ExpiryPolicy::default())
        .clock(Arc::new(clock.clone()))
        .build()
}
