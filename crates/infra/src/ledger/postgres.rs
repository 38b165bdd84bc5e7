//! Postgres-backed token ledger.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError |
//! |------------|----------------------|-------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Storage` |
//! | PoolClosed, Io, Tls, ... | N/A | `Storage` |
//!
//! ## Rotation
//!
//! `rotate` is a single conditional `UPDATE ... WHERE id = $1 AND access_token = $2
//! AND refresh_token = $3 RETURNING ...`. Postgres row locking makes the
//! condition and the write atomic; zero returned rows means the snapshot was
//! stale (`AlreadyRotated`) or the row is gone (`NotFound`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use storefront_auth::Role;
use storefront_core::{AccountId, TokenId};

use super::r#trait::{LedgerError, NewTokenRecord, Rotation, TokenLedger, TokenRecord, ensure_future_expiry};

const RECORD_COLUMNS: &str = "id, owner_id, role, access_token, refresh_token, expires_at, created_at";

#[derive(Debug, Clone)]
pub struct PostgresTokenLedger {
    pool: Arc<PgPool>,
}

impl PostgresTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn find_one(&self, column: &'static str, value: &str) -> Result<TokenRecord, LedgerError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM tokens WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_token", e))?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(LedgerError::NotFound),
        }
    }
}

#[async_trait]
impl TokenLedger for PostgresTokenLedger {
    #[instrument(skip(self, record), fields(owner_id = %record.owner_id, role = %record.role), err)]
    async fn create(&self, record: NewTokenRecord, now: DateTime<Utc>) -> Result<TokenRecord, LedgerError> {
        ensure_future_expiry(record.expires_at, now)?;

        let sql = format!(
            r#"
            INSERT INTO tokens (id, owner_id, role, access_token, refresh_token, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(*TokenId::new().as_uuid())
            .bind(*record.owner_id.as_uuid())
            .bind(record.role.as_str())
            .bind(&record.access_token)
            .bind(&record.refresh_token)
            .bind(record.expires_at)
            .bind(now)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_token", e))?;

        record_from_row(&row)
    }

    async fn find_by_access(&self, access_token: &str) -> Result<TokenRecord, LedgerError> {
        self.find_one("access_token", access_token).await
    }

    async fn find_by_refresh(&self, refresh_token: &str) -> Result<TokenRecord, LedgerError> {
        self.find_one("refresh_token", refresh_token).await
    }

    #[instrument(skip(self, current, rotation), fields(token_id = %current.id, owner_id = %current.owner_id), err)]
    async fn rotate(
        &self,
        current: &TokenRecord,
        rotation: Rotation,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, LedgerError> {
        ensure_future_expiry(rotation.expires_at, now)?;

        let refresh = rotation
            .refresh_token
            .unwrap_or_else(|| current.refresh_token.clone());

        let sql = format!(
            r#"
            UPDATE tokens
            SET access_token = $4, refresh_token = $5, expires_at = $6
            WHERE id = $1 AND access_token = $2 AND refresh_token = $3
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(*current.id.as_uuid())
            .bind(&current.access_token)
            .bind(&current.refresh_token)
            .bind(&rotation.access_token)
            .bind(&refresh)
            .bind(rotation.expires_at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rotate_token", e))?;

        if let Some(row) = row {
            return record_from_row(&row);
        }

        // Distinguish a lost race from a revoked row.
        let exists = sqlx::query("SELECT 1 FROM tokens WHERE id = $1")
            .bind(*current.id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rotate_token", e))?;
        if exists.is_some() {
            Err(LedgerError::AlreadyRotated)
        } else {
            Err(LedgerError::NotFound)
        }
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn revoke_all(&self, owner_id: AccountId) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM tokens WHERE owner_id = $1")
            .bind(*owner_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_tokens", e))?;
        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &PgRow) -> Result<TokenRecord, LedgerError> {
    let decode = |e: sqlx::Error| LedgerError::Storage(format!("failed to decode token row: {e}"));

    let role: String = row.try_get("role").map_err(decode)?;
    let role: Role = role
        .parse()
        .map_err(|e| LedgerError::Storage(format!("token row has {e}")))?;

    Ok(TokenRecord {
        id: TokenId::from_uuid(row.try_get("id").map_err(decode)?),
        owner_id: AccountId::from_uuid(row.try_get("owner_id").map_err(decode)?),
        role,
        access_token: row.try_get("access_token").map_err(decode)?,
        refresh_token: row.try_get("refresh_token").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return LedgerError::Duplicate;
        }
        return LedgerError::Storage(format!("database error in {}: {}", operation, db_err.message()));
    }
    LedgerError::Storage(format!("{} failed: {}", operation, err))
}
