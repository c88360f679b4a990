use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::sources::IssuerError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TokenCacheError {
    #[error("api name must not be empty")]
    EmptyApiName,

    #[error("no issuer registered for api '{0}'")]
    UnknownApi(String),

    /// Issuer unreachable, timed out, or refused. Nothing was stored.
    #[error("token issuer for '{api_name}' unavailable: {source}")]
    Unavailable {
        api_name: String,
        #[source]
        source: IssuerError,
    },

    #[error("token issuer for '{api_name}' returned an unusable response: {source}")]
    Malformed {
        api_name: String,
        #[source]
        source: IssuerError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenCacheError {
    pub(crate) fn from_issuer(api_name: &str, source: IssuerError) -> Self {
        let api_name = api_name.to_owned();
        if source.is_unavailable() {
            TokenCacheError::Unavailable { api_name, source }
        } else {
            TokenCacheError::Malformed { api_name, source }
        }
    }

    /// "Cannot proceed right now", as opposed to an infrastructure failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TokenCacheError::Unavailable { .. })
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            TokenCacheError::EmptyApiName => (StatusCode::BAD_REQUEST, "empty_api_name"),
            TokenCacheError::UnknownApi(_) => (StatusCode::NOT_FOUND, "unknown_api"),
            TokenCacheError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "issuer_unavailable"),
            TokenCacheError::Malformed { .. } => (StatusCode::BAD_GATEWAY, "issuer_malformed_response"),
            TokenCacheError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        }
    }
}

impl IntoResponse for TokenCacheError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
