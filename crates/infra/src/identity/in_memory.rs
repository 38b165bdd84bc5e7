use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use storefront_auth::{Account, NewAccount, Role};
use storefront_core::AccountId;

use super::r#trait::{IdentityError, IdentityStore};

/// In-memory identity store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts (including soft-deleted) held for `role`.
    pub fn count(&self, role: Role) -> usize {
        match self.accounts.read() {
            Ok(map) => map.values().filter(|a| a.role() == role).count(),
            Err(_) => 0,
        }
    }

    fn with_account(
        &self,
        role: Role,
        id: AccountId,
        f: impl FnOnce(&mut Account),
    ) -> Result<Account, IdentityError> {
        let mut map = self
            .accounts
            .write()
            .map_err(|_| IdentityError::Storage("lock poisoned".to_string()))?;
        let account = map
            .get_mut(&id)
            .filter(|a| a.role() == role)
            .ok_or(IdentityError::NotFound)?;
        f(account);
        Ok(account.clone())
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>, IdentityError> {
        let map = self
            .accounts
            .read()
            .map_err(|_| IdentityError::Storage("lock poisoned".to_string()))?;
        Ok(map
            .values()
            .find(|a| a.role() == role && a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, role: Role, id: AccountId) -> Result<Option<Account>, IdentityError> {
        let map = self
            .accounts
            .read()
            .map_err(|_| IdentityError::Storage("lock poisoned".to_string()))?;
        Ok(map.get(&id).filter(|a| a.role() == role).cloned())
    }

    async fn create(&self, account: NewAccount, now: DateTime<Utc>) -> Result<Account, IdentityError> {
        account.validate()?;
        let role = account.role();

        let mut map = self
            .accounts
            .write()
            .map_err(|_| IdentityError::Storage("lock poisoned".to_string()))?;
        if map.values().any(|a| a.role() == role && a.email == account.email) {
            return Err(IdentityError::EmailTaken(role));
        }

        let stored = account.into_account(now);
        map.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_display_name(
        &self,
        role: Role,
        id: AccountId,
        display_name: &str,
    ) -> Result<Account, IdentityError> {
        self.with_account(role, id, |a| a.display_name = display_name.to_string())
    }

    async fn soft_delete(&self, role: Role, id: AccountId, at: DateTime<Utc>) -> Result<Account, IdentityError> {
        self.with_account(role, id, |a| {
            a.deleted_at.get_or_insert(at);
        })
    }
}
