use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::sources::ApiConfig;
use crate::sources::secret::resolve_secret;
use crate::sources::{IssuedToken, IssuerError, TokenIssuer};
use crate::utils::constants::DEFAULT_GRANT_TYPE;

const MAX_LOGGED_BODY_CHARS: usize = 512;

/// OAuth2 client-credentials issuer (e.g. `https://id.twitch.tv/oauth2/token`).
///
/// Credentials go in the query string of a `POST`, which is what Twitch
/// expects and what most client-credential endpoints accept.
#[derive(Clone)]
pub struct ClientCredentialsIssuer {
    pub name: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    grant_type: String,
    scope: Option<String>,
    client: Client,
}

impl std::fmt::Debug for ClientCredentialsIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsIssuer")
            .field("name", &self.name)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("grant_type", &self.grant_type)
            .field("scope", &self.scope)
            .finish()
    }
}

impl ClientCredentialsIssuer {
    pub fn new(
        name: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            name: name.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant_type: DEFAULT_GRANT_TYPE.to_owned(),
            scope: None,
            client,
        })
    }

    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = grant_type.into();
        self
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Build from config, resolving `client_id` / `client_secret` now.
    pub fn from_config(name: &str, cfg: &ApiConfig, timeout: Duration) -> Result<Self> {
        let client_id = resolve_secret(&cfg.client_id).with_context(|| format!("apis.{}.client_id", name))?;
        let client_secret =
            resolve_secret(&cfg.client_secret).with_context(|| format!("apis.{}.client_secret", name))?;

        let issuer = Self::new(name, cfg.token_url.to_owned(), client_id, client_secret, timeout)?
            .with_scope(cfg.scope.to_owned());
        Ok(match &cfg.grant_type {
            Some(grant_type) => issuer.with_grant_type(grant_type.to_owned()),
            None => issuer,
        })
    }
}

#[async_trait]
impl TokenIssuer for ClientCredentialsIssuer {
    async fn mint(&self) -> Result<IssuedToken, IssuerError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", self.grant_type.as_str()),
        ];
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.as_str()));
        }

        debug!(api = %self.name, url = %self.token_url, "requesting token");
        let response = self
            .client
            .post(&self.token_url)
            .query(&params)
            .send()
            .await
            .map_err(IssuerError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(IssuerError::transport)?;
        if !status.is_success() {
            warn!(api = %self.name, status = status.as_u16(), body = %truncate_body(&body), "token request rejected");
            return Err(IssuerError::Status { status: status.as_u16(), body });
        }

        parse_token_response(&body)
    }
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(MAX_LOGGED_BODY_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn parse_token_response(body: &str) -> Result<IssuedToken, IssuerError> {
    let issued: IssuedToken =
        serde_json::from_str(body).map_err(|e| IssuerError::Malformed(format!("invalid token body: {}", e)))?;
    if issued.access_token.trim().is_empty() {
        return Err(IssuerError::Malformed("access_token is empty".to_owned()));
    }
    Ok(issued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_with_and_without_ttl() {
        let with_ttl = parse_token_response(r#"{"access_token":"abc","expires_in":3600,"token_type":"bearer"}"#).unwrap();
        assert_eq!(with_ttl.access_token, "abc");
        assert_eq!(with_ttl.reported_ttl(), Some(3600));

        let without_ttl = parse_token_response(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(without_ttl.reported_ttl(), None);

        let zero_ttl = parse_token_response(r#"{"access_token":"abc","expires_in":0}"#).unwrap();
        assert_eq!(zero_ttl.reported_ttl(), None);
    }

    #[test]
    fn rejects_malformed_bodies() {
        for body in ["not json", r#"{"token":"abc"}"#, r#"{"access_token":""}"#, r#"{"access_token":42}"#] {
            let err = parse_token_response(body).unwrap_err();
            assert!(matches!(err, IssuerError::Malformed(_)), "body {body:?} gave {err:?}");
            assert!(!err.is_unavailable());
        }
    }

    #[test]
    fn debug_output_redacts_client_secret() {
        let issuer =
            ClientCredentialsIssuer::new("IGDB", "http://127.0.0.1:1/token", "cid", "hunter2", Duration::from_secs(1))
                .unwrap();
        let rendered = format!("{:?}", issuer);
        assert!(rendered.contains("cid"));
        assert!(!rendered.contains("hunter2"), "{rendered}");
    }

    #[test]
    fn logged_body_is_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_LOGGED_BODY_CHARS + 10);
        assert_eq!(truncate_body(&long).chars().count(), MAX_LOGGED_BODY_CHARS);
        assert_eq!(truncate_body("short"), "short");
    }
}
