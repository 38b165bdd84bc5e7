//! Account model shared by the three user classes.
//!
//! Admins, consumers and suppliers live in separate collections. An email is
//! unique within one collection only, so the same address may exist once per
//! role; lookups always carry the role alongside the email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{AccountId, DomainError};

use crate::Role;

/// Variant-specific attributes. None of these take part in authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum AccountProfile {
    Admin,
    Consumer { address: String, phone: String },
    Supplier { company: String },
}

impl AccountProfile {
    /// Empty profile for a freshly enrolled account of `role`.
    pub fn empty(role: Role) -> Self {
        match role {
            Role::Admin => AccountProfile::Admin,
            Role::Consumer => AccountProfile::Consumer {
                address: String::new(),
                phone: String::new(),
            },
            Role::Supplier => AccountProfile::Supplier {
                company: String::new(),
            },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            AccountProfile::Admin => Role::Admin,
            AccountProfile::Consumer { .. } => Role::Consumer,
            AccountProfile::Supplier { .. } => Role::Supplier,
        }
    }
}

/// A stored account.
///
/// # Invariants
/// - `id` is assigned at creation and never changes.
/// - `password_hash` is empty for federation-only accounts.
/// - A soft-deleted account (`deleted_at` set) cannot authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub display_name: String,
    pub profile: AccountProfile,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_federation_only(&self) -> bool {
        self.password_hash.is_empty()
    }
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub profile: AccountProfile,
}

impl NewAccount {
    /// Account that can only sign in through a federated provider.
    pub fn federated(role: Role, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: String::new(),
            display_name: display_name.into(),
            profile: AccountProfile::empty(role),
        }
    }

    pub fn role(&self) -> Role {
        self.profile.role()
    }

    /// Basic shape checks; uniqueness is enforced by the store.
    pub fn validate(&self) -> Result<(), DomainError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if email.len() != self.email.len() {
            return Err(DomainError::validation("email must not carry surrounding whitespace"));
        }
        Ok(())
    }

    /// Materialise the account with a freshly generated id.
    pub fn into_account(self, created_at: DateTime<Utc>) -> Account {
        Account {
            id: AccountId::new(),
            email: self.email,
            password_hash: self.password_hash,
            display_name: self.display_name,
            profile: self.profile,
            created_at,
            deleted_at: None,
        }
    }
}
