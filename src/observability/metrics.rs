use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Cache metrics
    pub cache_lookups: IntCounterVec,
    pub token_expiry_unix: IntGaugeVec,

    // Issuer metrics
    pub mint_requests: IntCounterVec,
    pub mint_failures: IntCounterVec,
    pub mint_duration: HistogramVec,

    // Store metrics
    pub store_writes: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("apitokencache".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Cache
            cache_lookups: IntCounterVec::new(Opts::new("token_cache_lookups_total", "Token lookups by result (hit/miss)"),&["api", "result"],).unwrap(),
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Expiry of the last minted token"),&["api"],).unwrap(),

            // Issuer
            mint_requests: IntCounterVec::new(Opts::new("token_mint_requests_total", "Upstream token mint attempts"),&["api"],).unwrap(),
            mint_failures: IntCounterVec::new(Opts::new("token_mint_failures_total", "Upstream token mint failures by reason"),&["api", "reason"],).unwrap(),
            mint_duration: HistogramVec::new(HistogramOpts::new("token_mint_duration_seconds", "Upstream token mint duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["api"],).unwrap(),

            // Store
            store_writes: IntCounterVec::new(Opts::new("token_store_writes_total", "Conditional store writes by outcome (written/skipped)"),&["api", "outcome"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.cache_lookups.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.mint_requests.clone())).unwrap();
        reg.register(Box::new(metrics.mint_failures.clone())).unwrap();
        reg.register(Box::new(metrics.mint_duration.clone())).unwrap();
        reg.register(Box::new(metrics.store_writes.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
