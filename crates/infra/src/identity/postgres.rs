//! Postgres-backed identity store.
//!
//! Each role has its own table (`admins`, `consumers`, `suppliers`) sharing the
//! columns `id, email, password_hash, display_name, created_at, deleted_at`;
//! consumers add `address, phone`, suppliers add `company`. `email` carries a
//! unique constraint per table, so a unique violation (`23505`) on insert is
//! reported as `EmailTaken`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use storefront_auth::{Account, AccountProfile, NewAccount, Role};
use storefront_core::AccountId;

use super::r#trait::{IdentityError, IdentityStore};

const COMMON_COLUMNS: &str = "id, email, password_hash, display_name, created_at, deleted_at";

fn table(role: Role) -> &'static str {
    match role {
        Role::Admin => "admins",
        Role::Consumer => "consumers",
        Role::Supplier => "suppliers",
    }
}

fn select_columns(role: Role) -> String {
    match role {
        Role::Admin => COMMON_COLUMNS.to_string(),
        Role::Consumer => format!("{COMMON_COLUMNS}, address, phone"),
        Role::Supplier => format!("{COMMON_COLUMNS}, company"),
    }
}

#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self, email), fields(role = %role), err)]
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>, IdentityError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = $1",
            select_columns(role),
            table(role)
        );
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_account_by_email", role, e))?;
        row.map(|r| account_from_row(role, &r)).transpose()
    }

    #[instrument(skip(self), fields(role = %role, account_id = %id), err)]
    async fn find_by_id(&self, role: Role, id: AccountId) -> Result<Option<Account>, IdentityError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", select_columns(role), table(role));
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_account_by_id", role, e))?;
        row.map(|r| account_from_row(role, &r)).transpose()
    }

    #[instrument(skip(self, account), fields(role = %account.role()), err)]
    async fn create(&self, account: NewAccount, now: DateTime<Utc>) -> Result<Account, IdentityError> {
        account.validate()?;
        let role = account.role();
        let account = account.into_account(now);
        let returning = select_columns(role);

        let (extra_columns, extra_params) = match role {
            Role::Admin => ("", ""),
            Role::Consumer => (", address, phone", ", $6, $7"),
            Role::Supplier => (", company", ", $6"),
        };
        let sql = format!(
            "INSERT INTO {} (id, email, password_hash, display_name, created_at{extra_columns}) \
             VALUES ($1, $2, $3, $4, $5{extra_params}) RETURNING {returning}",
            table(role)
        );

        let query = sqlx::query(&sql)
            .bind(*account.id.as_uuid())
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.display_name)
            .bind(account.created_at);
        let query = match &account.profile {
            AccountProfile::Admin => query,
            AccountProfile::Consumer { address, phone } => query.bind(address).bind(phone),
            AccountProfile::Supplier { company } => query.bind(company),
        };

        let row = query
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_account", role, e))?;
        account_from_row(role, &row)
    }

    #[instrument(skip(self, display_name), fields(role = %role, account_id = %id), err)]
    async fn update_display_name(
        &self,
        role: Role,
        id: AccountId,
        display_name: &str,
    ) -> Result<Account, IdentityError> {
        let sql = format!(
            "UPDATE {} SET display_name = $2 WHERE id = $1 RETURNING {}",
            table(role),
            select_columns(role)
        );
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .bind(display_name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_display_name", role, e))?
            .ok_or(IdentityError::NotFound)?;
        account_from_row(role, &row)
    }

    #[instrument(skip(self), fields(role = %role, account_id = %id), err)]
    async fn soft_delete(&self, role: Role, id: AccountId, at: DateTime<Utc>) -> Result<Account, IdentityError> {
        let sql = format!(
            "UPDATE {} SET deleted_at = COALESCE(deleted_at, $2) WHERE id = $1 RETURNING {}",
            table(role),
            select_columns(role)
        );
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("soft_delete_account", role, e))?
            .ok_or(IdentityError::NotFound)?;
        account_from_row(role, &row)
    }
}

fn account_from_row(role: Role, row: &PgRow) -> Result<Account, IdentityError> {
    let decode = |e: sqlx::Error| IdentityError::Storage(format!("failed to decode {} row: {e}", table(role)));

    let profile = match role {
        Role::Admin => AccountProfile::Admin,
        Role::Consumer => AccountProfile::Consumer {
            address: row.try_get("address").map_err(decode)?,
            phone: row.try_get("phone").map_err(decode)?,
        },
        Role::Supplier => AccountProfile::Supplier {
            company: row.try_get("company").map_err(decode)?,
        },
    };

    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id").map_err(decode)?),
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        display_name: row.try_get("display_name").map_err(decode)?,
        profile,
        created_at: row.try_get("created_at").map_err(decode)?,
        deleted_at: row.try_get("deleted_at").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, role: Role, err: sqlx::Error) -> IdentityError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return IdentityError::EmailTaken(role);
        }
        return IdentityError::Storage(format!("database error in {}: {}", operation, db_err.message()));
    }
    IdentityError::Storage(format!("{} failed: {}", operation, err))
}
