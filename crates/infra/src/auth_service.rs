//! Authentication orchestration.
//!
//! `AuthService` composes the identity store, the token ledger, the token
//! issuer and the password hasher into the session lifecycle:
//!
//! ```text
//! login    : identity lookup → password verify → issue → ledger.create
//! refresh  : ledger.find_by_refresh → window check → owner still active
//!            → issue → ledger.rotate (CAS)
//! revoke   : ledger.revoke_all
//! ```
//!
//! Store IO goes through the injected traits. Argon2 work runs on the
//! blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, info, instrument, warn};

use storefront_auth::{
    Account, AccountProfile, IssuerError, NewAccount, PasswordError, PasswordHasher, Role, TokenIssuer,
};
use storefront_core::AccountId;

use crate::identity::{IdentityError, IdentityStore};
use crate::ledger::{LedgerError, NewTokenRecord, Rotation, TokenLedger};
use crate::validator::{TokenValidator, ValidationError};

/// How long after access expiry a refresh token is still honoured.
pub fn default_refresh_ttl() -> Duration {
    Duration::days(7)
}

pub fn max_refresh_ttl() -> Duration {
    Duration::days(365)
}

/// Why a caller was not authenticated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Unauthenticated {
    #[error("invalid email or password")]
    BadCredentials,

    #[error("unknown refresh token")]
    UnknownRefreshToken,

    #[error("refresh token expired")]
    RefreshExpired,

    #[error("account is no longer active")]
    InactiveAccount,

    #[error(transparent)]
    Token(#[from] ValidationError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("identity provider failure: {0}")]
    Upstream(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AuthError {
    fn from(e: ValidationError) -> Self {
        AuthError::Unauthenticated(Unauthenticated::Token(e))
    }
}

impl From<LedgerError> for AuthError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound => AuthError::NotFound,
            LedgerError::AlreadyRotated => AuthError::Conflict(e.to_string()),
            LedgerError::InvalidExpiry { .. } | LedgerError::Duplicate => AuthError::Internal(e.to_string()),
            LedgerError::Storage(msg) => AuthError::Storage(msg),
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::EmailTaken(_) => AuthError::Conflict(e.to_string()),
            IdentityError::NotFound => AuthError::NotFound,
            IdentityError::Validation(msg) => AuthError::BadRequest(msg),
            IdentityError::Storage(msg) => AuthError::Storage(msg),
        }
    }
}

impl From<IssuerError> for AuthError {
    fn from(e: IssuerError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

/// Credentials handed to a client after login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedSession {
    pub owner_id: AccountId,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    ledger: Arc<dyn TokenLedger>,
    issuer: TokenIssuer,
    hasher: PasswordHasher,
    refresh_ttl: Duration,
}

impl core::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.issuer)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        ledger: Arc<dyn TokenLedger>,
        issuer: TokenIssuer,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            identities,
            ledger,
            issuer,
            hasher,
            refresh_ttl: default_refresh_ttl(),
        }
    }

    pub fn with_refresh_ttl(mut self, refresh_ttl: Duration) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    /// A validator sharing this service's signing key and ledger.
    pub fn validator(&self) -> TokenValidator {
        TokenValidator::new(self.issuer.clone(), self.ledger.clone())
    }

    /// Password login for `role`.
    ///
    /// Unknown email, soft-deleted account, federation-only account and wrong
    /// password are indistinguishable to the caller. Nothing is written on
    /// failure.
    #[instrument(skip(self, email, password), fields(role = %role), err(level = Level::DEBUG))]
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let account = self
            .identities
            .find_by_email(role, email)
            .await?
            .filter(|a| a.is_active() && !a.is_federation_only())
            .ok_or(Unauthenticated::BadCredentials)?;

        if !self.verify_password(password, &account.password_hash).await? {
            return Err(Unauthenticated::BadCredentials.into());
        }

        self.issue_session(account.id, role, now).await
    }

    /// Mint an access/refresh pair for an already authenticated account and
    /// persist it.
    #[instrument(skip(self), fields(owner_id = %owner_id, role = %role), err(level = Level::DEBUG))]
    pub async fn issue_session(
        &self,
        owner_id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let access = self.issuer.issue_access(owner_id, role, now)?;
        let record = self
            .ledger
            .create(
                NewTokenRecord {
                    owner_id,
                    role,
                    access_token: access.token,
                    refresh_token: self.issuer.issue_refresh(),
                    expires_at: access.expires_at,
                },
                now,
            )
            .await?;

        info!(token_id = %record.id, "session issued");
        Ok(IssuedSession {
            owner_id,
            role,
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_at: record.expires_at,
        })
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// Owner and role come from the ledger row. The refresh token is rotated
    /// together with the access token, so a used refresh token stops working.
    /// Losing a concurrent rotation of the same row yields `Conflict`.
    ///
    /// A row whose owner is gone or soft-deleted is revoked instead of
    /// rotated.
    #[instrument(skip(self, refresh_token), err(level = Level::DEBUG))]
    pub async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<IssuedSession, AuthError> {
        let record = match self.ledger.find_by_refresh(refresh_token).await {
            Ok(record) => record,
            Err(LedgerError::NotFound) => return Err(Unauthenticated::UnknownRefreshToken.into()),
            Err(e) => return Err(e.into()),
        };

        let deadline = record
            .expires_at
            .checked_add_signed(self.refresh_ttl)
            .ok_or_else(|| AuthError::Internal("refresh window out of range".to_string()))?;
        if now >= deadline {
            return Err(Unauthenticated::RefreshExpired.into());
        }

        let owner = self.identities.find_by_id(record.role, record.owner_id).await?;
        if !owner.as_ref().is_some_and(Account::is_active) {
            warn!(token_id = %record.id, owner_id = %record.owner_id, "refresh for inactive account");
            self.ledger.revoke_all(record.owner_id).await?;
            return Err(Unauthenticated::InactiveAccount.into());
        }

        let access = self.issuer.issue_access(record.owner_id, record.role, now)?;
        let rotation = Rotation {
            access_token: access.token,
            expires_at: access.expires_at,
            refresh_token: Some(self.issuer.issue_refresh()),
        };

        let rotated = match self.ledger.rotate(&record, rotation, now).await {
            Ok(rotated) => rotated,
            Err(LedgerError::AlreadyRotated) => {
                warn!(token_id = %record.id, "lost concurrent refresh");
                return Err(AuthError::Conflict("refresh token was rotated concurrently".to_string()));
            }
            // Revoked between lookup and rotation.
            Err(LedgerError::NotFound) => return Err(Unauthenticated::UnknownRefreshToken.into()),
            Err(e) => return Err(e.into()),
        };

        Ok(IssuedSession {
            owner_id: rotated.owner_id,
            role: rotated.role,
            access_token: rotated.access_token,
            refresh_token: rotated.refresh_token,
            expires_at: rotated.expires_at,
        })
    }

    /// Delete every token record of `owner_id`.
    #[instrument(skip(self), fields(owner_id = %owner_id), err(level = Level::DEBUG))]
    pub async fn revoke_all(&self, owner_id: AccountId) -> Result<u64, AuthError> {
        let removed = self.ledger.revoke_all(owner_id).await?;
        info!(removed, "tokens revoked");
        Ok(removed)
    }

    /// Create a password account unless one with `email` already exists for
    /// `role`. Returns the existing or new account.
    #[instrument(skip(self, email, password, display_name), fields(role = %role), err(level = Level::DEBUG))]
    pub async fn ensure_account(
        &self,
        role: Role,
        email: &str,
        password: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        if let Some(existing) = self.identities.find_by_email(role, email).await? {
            return Ok(existing);
        }

        let account = NewAccount {
            email: email.to_string(),
            password_hash: self.hash_password(password).await?,
            display_name: display_name.to_string(),
            profile: AccountProfile::empty(role),
        };
        match self.identities.create(account, now).await {
            Ok(created) => {
                info!(account_id = %created.id, "account created");
                Ok(created)
            }
            // Created concurrently.
            Err(IdentityError::EmailTaken(_)) => self
                .identities
                .find_by_email(role, email)
                .await?
                .ok_or(AuthError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-delete an account and revoke all of its tokens.
    #[instrument(skip(self), fields(role = %role, account_id = %id), err(level = Level::DEBUG))]
    pub async fn deactivate_account(
        &self,
        role: Role,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        let account = self.identities.soft_delete(role, id, now).await?;
        self.ledger.revoke_all(id).await?;
        Ok(account)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {e}")))??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))
    }
}
