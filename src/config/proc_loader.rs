use std::{fs, path::Path};
use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::sources::ServiceConfig;
use crate::config::proc_validator;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::debug;

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content).context("parse config error")?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }
    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .await
        .map_err(|errors| anyhow!("config is not valid, total errors:{}, \n{}", errors.len(), errors.join("\n")))?;

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").expect("env placeholder pattern is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn expands_vars_with_defaults() {
        std::env::set_var("API_TOKEN_CACHE_TEST_HOST", "10.0.0.1");
        std::env::remove_var("API_TOKEN_CACHE_TEST_PORT");
        let out = expand_env_vars("host: ${API_TOKEN_CACHE_TEST_HOST}\nport: ${API_TOKEN_CACHE_TEST_PORT:8080}\nx: ${API_TOKEN_CACHE_TEST_PORT}");
        assert_eq!(out, "host: 10.0.0.1\nport: 8080\nx: ");
        std::env::remove_var("API_TOKEN_CACHE_TEST_HOST");
    }
}
