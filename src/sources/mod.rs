//! Token issuers: upstream endpoints that mint bearer tokens.

pub mod client_credentials;
pub mod secret;

use async_trait::async_trait;
use serde::Deserialize;

pub use client_credentials::ClientCredentialsIssuer;

/// Token as reported by an issuer, before any expiry policy is applied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Lifetime in seconds; absent or zero means "not reported".
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl IssuedToken {
    pub fn reported_ttl(&self) -> Option<u64> {
        self.expires_in.filter(|secs| *secs > 0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    /// Carries the error with its URL stripped; the query string holds credentials.
    #[error("token request failed: {0}")]
    Transport(reqwest::Error),

    /// `body` is kept for logs and never rendered in the message.
    #[error("token request rejected with status {status}")]
    Status { status: u16, body: String },

    #[error("unexpected token response: {0}")]
    Malformed(String),
}

impl IssuerError {
    pub fn transport(err: reqwest::Error) -> Self {
        IssuerError::Transport(err.without_url())
    }

    /// The issuer could not be reached or refused; "try again later".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, IssuerError::Transport(_) | IssuerError::Status { .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            IssuerError::Transport(e) if e.is_timeout() => "timeout",
            IssuerError::Transport(_) => "transport",
            IssuerError::Status { .. } => "status",
            IssuerError::Malformed(_) => "malformed",
        }
    }
}

#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mint a fresh token. Every call yields a new credential.
    async fn mint(&self) -> Result<IssuedToken, IssuerError>;
}
