use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_auth::{Account, NewAccount, Role};
use storefront_core::{AccountId, DomainError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("an account with this email already exists for role '{0}'")]
    EmailTaken(Role),

    #[error("account not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("identity storage failure: {0}")]
    Storage(String),
}

impl From<DomainError> for IdentityError {
    fn from(e: DomainError) -> Self {
        IdentityError::Validation(e.to_string())
    }
}

/// Account persistence, one collection per role.
///
/// Lookups always carry the role: the same email may exist once per role and
/// variants are never merged. Soft-deleted accounts are still returned by the
/// finders (callers decide what a deleted account means) and still hold their
/// email.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>, IdentityError>;

    async fn find_by_id(&self, role: Role, id: AccountId) -> Result<Option<Account>, IdentityError>;

    /// Insert a new account. Fails with `EmailTaken` when the email is already
    /// present in the role's collection.
    async fn create(&self, account: NewAccount, now: DateTime<Utc>) -> Result<Account, IdentityError>;

    async fn update_display_name(
        &self,
        role: Role,
        id: AccountId,
        display_name: &str,
    ) -> Result<Account, IdentityError>;

    /// Mark the account deleted. Repeated calls keep the first timestamp.
    async fn soft_delete(&self, role: Role, id: AccountId, at: DateTime<Utc>) -> Result<Account, IdentityError>;
}
