use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::cache::token::{AccessToken, TokenOrigin};
use crate::error::TokenCacheError;
use crate::server::server::AppState;

pub const TOKENS_PATH: &str = "/tokens/{api_name}";

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub api_name: String,
    pub access_token: String,
    pub expires_at: String,
    /// seconds left at response time
    pub expires_in: i64,
    pub origin: TokenOrigin,
}

impl TokenResponse {
    pub fn from_token(token: &AccessToken, now: DateTime<Utc>) -> Self {
        Self {
            api_name: token.api_name.to_owned(),
            access_token: token.value.to_owned(),
            expires_at: token.expires_at.to_rfc3339(),
            expires_in: (token.expires_at - now).num_seconds().max(0),
            origin: token.origin,
        }
    }
}

pub fn router() -> Router<AppState> {
    info!("served path: {}", TOKENS_PATH);
    Router::new().route(TOKENS_PATH, get(get_token))
}

async fn get_token(
    State(state): State<AppState>,
    Path(api_name): Path<String>,
) -> Result<Json<TokenResponse>, TokenCacheError> {
    let token = state.token_cache.get_access_token(&api_name).await?;
    Ok(Json(TokenResponse::from_token(&token, Utc::now())))
}
