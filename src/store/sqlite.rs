//! SQLite-backed token store.
//!
//! Table `api_tokens` holds one row per api name. `expires_at` and
//! `updated_at` are unix milliseconds so expiry checks compare integers.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::cache::token::CachedToken;
use crate::store::{StoreError, TokenStore, UpsertOutcome};
use crate::utils::constants::SQLITE_BUSY_TIMEOUT_MS;

const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pub pool: SqlitePool,
}

impl SqliteTokenStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS));
        if !is_in_memory(url) {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if is_in_memory(url) {
            // every connection to :memory: is a separate database, so pin one
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!(url = %url, "connected to sqlite token store");
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect(IN_MEMORY_URL, 1).await
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_tokens (
                api_name    TEXT PRIMARY KEY NOT NULL,
                token       TEXT NOT NULL,
                expires_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM api_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn find(&self, api_name: &str) -> Result<Option<CachedToken>, StoreError> {
        let row = sqlx::query("SELECT api_name, token, expires_at FROM api_tokens WHERE api_name = ?")
            .bind(api_name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_token(&r)).transpose()
    }

    async fn upsert_if_stale(&self, candidate: &CachedToken, now: DateTime<Utc>) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The WHERE guard re-checks the stored expiry in the same statement
        // that writes, so a record refreshed by another writer is never
        // overwritten regardless of isolation level.
        let result = sqlx::query(
            r#"
            INSERT INTO api_tokens (api_name, token, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(api_name) DO UPDATE SET
                token = excluded.token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            WHERE api_tokens.expires_at <= ?4
            "#,
        )
        .bind(&candidate.api_name)
        .bind(&candidate.token)
        .bind(candidate.expires_at.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        let outcome = if result.rows_affected() == 0 {
            let kept = sqlx::query("SELECT expires_at FROM api_tokens WHERE api_name = ?")
                .bind(&candidate.api_name)
                .fetch_optional(&mut *tx)
                .await?
                .map(|r| r.try_get::<i64, _>("expires_at"))
                .transpose()?;
            debug!(api = %candidate.api_name, kept_expires_at_ms = ?kept, "valid token already stored, write skipped");
            UpsertOutcome::Skipped
        } else {
            UpsertOutcome::Written
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn upsert(&self, token: &CachedToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens (api_name, token, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(api_name) DO UPDATE SET
                token = excluded.token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&token.api_name)
        .bind(&token.token)
        .bind(token.expires_at.timestamp_millis())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_token(row: &SqliteRow) -> Result<CachedToken, StoreError> {
    let api_name: String = row.try_get("api_name")?;
    let token: String = row.try_get("token")?;
    let expires_at_ms: i64 = row.try_get("expires_at")?;
    let expires_at = DateTime::from_timestamp_millis(expires_at_ms).ok_or_else(|| StoreError::Corrupt {
        api_name: api_name.to_owned(),
        reason: format!("expires_at {} out of range", expires_at_ms),
    })?;
    Ok(CachedToken { api_name, token, expires_at })
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
