//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks settings (margins, timeouts, server, metrics, logging),
//!   the store block and every api entry

use tracing::{error, info};

use crate::config::settings::SettingsConfig;
use crate::config::sources::{ApiConfig, SecretValue, ServiceConfig, StoreConfig};
use crate::helpers::time::{get_token_default_ttl_seconds, get_token_safety_margin_seconds};
use crate::observability::metrics::get_metrics;

const ONE_YEAR_SECS: u64 = 60 * 60 * 24 * 365;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_store(&cfg.store, &mut errors);

    if cfg.apis.is_empty() {
        errors.push("config: 'apis' is empty; at least one api required".to_string());
    }
    let mut names: Vec<&String> = cfg.apis.keys().collect();
    names.sort();
    for name in names {
        validate_api(name, &cfg.apis[name], &cfg.settings, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(s) = settings.safety_margin_seconds {
        if s > ONE_YEAR_SECS {
            errors.push(format!("settings.safety_margin_seconds ({}) is unreasonably large", s));
        }
    }
    if settings.default_ttl_seconds == Some(0) {
        errors.push("settings.default_ttl_seconds must be > 0".to_string());
    }
    if settings.http_timeout_ms == 0 {
        errors.push("settings.http_timeout_ms must be > 0".to_string());
    }

    if settings.server.host.trim().is_empty() {
        errors.push(format!("settings.server.host '{}' must be valid", settings.server.host));
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!("settings.server.port '{}' must be an integer in range 0-65535", settings.server.port));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", metrics.path));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if let StoreConfig::Sqlite { url, max_connections } = store {
        if url.trim().is_empty() {
            errors.push("store.url cannot be empty for sqlite store".to_string());
        } else if !url.starts_with("sqlite:") {
            errors.push(format!("store.url '{}' must start with 'sqlite:'", url));
        }
        if *max_connections == 0 {
            errors.push("store.max_connections must be > 0".to_string());
        }
    }
}

/// API BASICS & EXPIRY INVARIANTS
fn validate_api(name: &str, api: &ApiConfig, settings: &SettingsConfig, errors: &mut Vec<String>) {
    if name.trim().is_empty() {
        errors.push("apis: api name cannot be empty".to_string());
    }

    let url = api.token_url.trim();
    if url.is_empty() {
        errors.push(format!("apis.{}: token_url cannot be empty", name));
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("apis.{}: token_url '{}' must be an http(s) URL", name, url));
    }

    validate_secret_value(&format!("apis.{}.client_id", name), &api.client_id, errors);
    validate_secret_value(&format!("apis.{}.client_secret", name), &api.client_secret, errors);

    if let Some(grant_type) = &api.grant_type {
        if grant_type.trim().is_empty() {
            errors.push(format!("apis.{}: grant_type cannot be empty when set", name));
        }
    }

    if let Some(s) = api.safety_margin_seconds {
        if s > ONE_YEAR_SECS {
            errors.push(format!("apis.{}.safety_margin_seconds ({}) is unreasonably large", name, s));
        }
    }
    if api.default_ttl_seconds == Some(0) {
        errors.push(format!("apis.{}.default_ttl_seconds must be > 0", name));
    }

    // a default lifetime inside the margin would never be stored
    let margin = get_token_safety_margin_seconds(settings.safety_margin_seconds, api.safety_margin_seconds);
    let ttl = get_token_default_ttl_seconds(settings.default_ttl_seconds, api.default_ttl_seconds);
    if ttl <= margin {
        errors.push(format!(
            "apis.{}: default_ttl_seconds ({}) must be greater than safety_margin_seconds ({})",
            name, ttl, margin
        ));
    }
}

fn validate_secret_value(path: &str, v: &SecretValue, errors: &mut Vec<String>) {
    match v {
        SecretValue::Literal { value } => {
            if value.trim().is_empty() {
                errors.push(format!("{}: literal value cannot be empty", path));
            }
        }
        SecretValue::FromEnv { from_env } => {
            if from_env.trim().is_empty() {
                errors.push(format!("{}: env name cannot be empty", path));
            }
        }
        SecretValue::FromFile { from_file } => {
            // existence is checked when the issuer is built
            if from_file.trim().is_empty() {
                errors.push(format!("{}: from_file path cannot be empty", path));
            }
        }
    }
}
