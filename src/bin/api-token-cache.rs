use anyhow::{Context, Result};
use api_token_cache::cache::build_token_cache;
use api_token_cache::server;
use api_token_cache::store;
use api_token_cache::utils::config_loader;
use api_token_cache::utils::logging;
use api_token_cache::utils::logging::LogLevel;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "api-token-cache.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level)?;

    // -------------------------------
    // 2. Open token store
    // -------------------------------

    let token_store = store::from_config(&service_config.store)
        .await
        .context("failed to open token store")?;

    // -------------------------------
    // 3. Register issuers
    // -------------------------------

    let token_cache = build_token_cache(&service_config, token_store)?;
    info!(apis = ?token_cache.api_names(), "token cache ready");

    // -------------------------------
    // 4. Serve tokens and metrics until ctrl-c
    // -------------------------------

    info!("Service starting...");
    server::server::start(&service_config.settings, token_cache, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
