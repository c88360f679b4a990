pub mod token;
pub mod token_cache;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::config::sources::ServiceConfig;
use crate::sources::ClientCredentialsIssuer;
use crate::store::TokenStore;
use token_cache::TokenCache;

/// Register a client-credentials issuer for every configured api.
pub fn build_token_cache(service_config: &ServiceConfig, store: Arc<dyn TokenStore>) -> Result<TokenCache> {
    let settings = &service_config.settings;
    let timeout = Duration::from_millis(settings.http_timeout_ms);

    let mut builder = TokenCache::builder(store).coalesce_refreshes(settings.coalesce_refreshes);
    for (name, api_config) in &service_config.apis {
        let issuer = ClientCredentialsIssuer::from_config(name, api_config, timeout)?;
        let policy = api_config.expiry_policy(settings);
        info!(
            api = %name,
            safety_margin_seconds = policy.safety_margin_seconds,
            default_ttl_seconds = policy.default_ttl_seconds,
            "registered token issuer"
        );
        builder = builder.register(name.to_owned(), Arc::new(issuer), policy);
    }
    Ok(builder.build())
}
