//! # API Token Cache Library
//!
//! Hands out bearer tokens for client-credential APIs, serving a stored
//! token while it is valid and minting a new one from the issuer otherwise.
//! Tokens are persisted in a shared store and refreshed with a conditional
//! write, so concurrent callers converge on one stored record.
//!
//! Modules:
//! - `cache`: stored token model and the `TokenCache` refresh logic
//! - `store`: `TokenStore` trait with in-memory and SQLite backends
//! - `sources`: `TokenIssuer` trait and the client-credentials issuer
//! - `config`: service configuration, loading and validation
//! - `server`: HTTP surface handing tokens to co-located callers

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod server;
pub mod sources;
pub mod store;
pub mod tests;
pub mod utils;


pub use crate::cache::token::{AccessToken, CachedToken, TokenOrigin};
pub use crate::cache::token_cache::{ExpiryPolicy, TokenCache};
pub use crate::config::sources::*;
pub use crate::error::TokenCacheError;
