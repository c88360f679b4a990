use std::{env, fs};

use anyhow::{anyhow, Result};

use crate::config::sources::SecretValue;

/// Resolve a configured secret to its string value.
pub fn resolve_secret(value: &SecretValue) -> Result<String> {
    match value {
        SecretValue::Literal { value } => Ok(value.to_owned()),
        SecretValue::FromEnv { from_env } => {
            env::var(from_env).map_err(|err| anyhow!("env var '{}': {}", from_env, err))
        }
        SecretValue::FromFile { from_file } => fs::read_to_string(from_file)
            .map_err(|err| anyhow!("file '{}': {}", from_file, err))
            .map(|res| res.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn literal_is_returned_verbatim() {
        let value = SecretValue::Literal { value: "abc".into() };
        assert_eq!(resolve_secret(&value).unwrap(), "abc");
    }

    #[test]
    #[serial]
    fn env_secret_is_read_and_missing_env_fails() {
        env::set_var("API_TOKEN_CACHE_TEST_SECRET", "from-env");
        let value = SecretValue::FromEnv { from_env: "API_TOKEN_CACHE_TEST_SECRET".into() };
        assert_eq!(resolve_secret(&value).unwrap(), "from-env");

        env::remove_var("API_TOKEN_CACHE_TEST_SECRET");
        assert!(resolve_secret(&value).is_err());
    }

    #[test]
    fn file_secret_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  file-secret  ").unwrap();
        let value = SecretValue::FromFile { from_file: file.path().to_string_lossy().into_owned() };
        assert_eq!(resolve_secret(&value).unwrap(), "file-secret");
    }
}
