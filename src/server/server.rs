use std::future::Future;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::cache::token_cache::TokenCache;
use crate::config::settings::{MetricsConfig, SettingsConfig};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::token_routes;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub token_cache: TokenCache,
}

impl AppState {
    pub fn new(metrics: &Metrics, token_cache: TokenCache) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            token_cache,
        }
    }
}

pub fn router(state: AppState, metrics_config: &MetricsConfig) -> Router {
    Router::new()
        .merge(state.metrics_state.router(metrics_config))
        .merge(token_routes::router())
        .with_state(state)
}

/// Serve token and metrics routes until `shutdown` resolves.
pub async fn start<F>(settings_config: &SettingsConfig, token_cache: TokenCache, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics = get_metrics().await;
    let app = router(AppState::new(metrics, token_cache), &settings_config.metrics);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!(address = %bind_addr, "http server listening");

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")?;
    metrics.up.set(0);

    Ok(())
}
