use serde::Deserialize;
use std::collections::HashMap;

use crate::cache::token_cache::ExpiryPolicy;
use crate::config::settings::SettingsConfig;
use crate::helpers::time::{get_token_default_ttl_seconds, get_token_safety_margin_seconds};
use crate::utils::constants::DEFAULT_SQLITE_MAX_CONNECTIONS;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub apis: HashMap<String, ApiConfig>,
}

/// ================================
/// Store
/// ================================
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    Sqlite {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

/// ================================
/// Upstream APIs
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub token_url: String,
    pub client_id: SecretValue,
    pub client_secret: SecretValue,
    /// defaults to `client_credentials`
    pub grant_type: Option<String>,
    pub scope: Option<String>,
    pub safety_margin_seconds: Option<u64>,
    pub default_ttl_seconds: Option<u64>,
}

impl ApiConfig {
    pub fn expiry_policy(&self, settings: &SettingsConfig) -> ExpiryPolicy {
        ExpiryPolicy {
            safety_margin_seconds: get_token_safety_margin_seconds(
                settings.safety_margin_seconds,
                self.safety_margin_seconds,
            ),
            default_ttl_seconds: get_token_default_ttl_seconds(settings.default_ttl_seconds, self.default_ttl_seconds),
        }
    }
}

/// Credential value sources
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SecretValue {
    Literal { value: String },
    FromEnv { from_env: String },
    FromFile { from_file: String },
}

fn default_max_connections() -> u32 {
    DEFAULT_SQLITE_MAX_CONNECTIONS
}
