use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_auth::Role;
use storefront_core::{AccountId, TokenId};

/// One issued credential pair.
///
/// ## Lifecycle
///
/// 1. **Created** on a successful password or federated login
/// 2. **Rotated** in place on refresh (new access token + expiry, new refresh token)
/// 3. **Deleted** together with every other record of the owner on revoke
///
/// Expired rows are not swept; validation enforces `expires_at` at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: TokenId,
    pub owner_id: AccountId,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of `access_token`.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A token pair ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTokenRecord {
    pub owner_id: AccountId,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Replacement values applied by [`TokenLedger::rotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// `None` keeps the current refresh token.
    pub refresh_token: Option<String>,
}

/// Ledger operation error.
///
/// `NotFound`, `AlreadyRotated` and `InvalidExpiry` are expected outcomes;
/// `Storage` is an infrastructure failure and must never be read as "not found".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("token record not found")]
    NotFound,

    #[error("token record was rotated concurrently")]
    AlreadyRotated,

    #[error("expiry {expires_at} is not after {now}")]
    InvalidExpiry {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("token value already present in ledger")]
    Duplicate,

    #[error("ledger storage failure: {0}")]
    Storage(String),
}

/// Persistence of issued token records.
///
/// ## Atomicity
///
/// `rotate` is a compare-and-swap: it succeeds only while the stored row still
/// carries the access and refresh values of `current`. Of two rotations racing
/// on the same snapshot exactly one is applied; the other gets
/// [`LedgerError::AlreadyRotated`].
///
/// ## Revocation
///
/// `revoke_all` removes every row the owner has at the time it executes. A row
/// created by a login racing with the revoke may survive.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn create(&self, record: NewTokenRecord, now: DateTime<Utc>) -> Result<TokenRecord, LedgerError>;

    async fn find_by_access(&self, access_token: &str) -> Result<TokenRecord, LedgerError>;

    async fn find_by_refresh(&self, refresh_token: &str) -> Result<TokenRecord, LedgerError>;

    async fn rotate(
        &self,
        current: &TokenRecord,
        rotation: Rotation,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, LedgerError>;

    /// Delete every record owned by `owner_id`, returning how many were removed.
    async fn revoke_all(&self, owner_id: AccountId) -> Result<u64, LedgerError>;
}

/// Boundary check shared by every backend.
pub(crate) fn ensure_future_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), LedgerError> {
    if expires_at > now {
        Ok(())
    } else {
        Err(LedgerError::InvalidExpiry { expires_at, now })
    }
}
