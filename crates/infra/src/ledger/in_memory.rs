use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use storefront_core::{AccountId, TokenId};

use super::r#trait::{LedgerError, NewTokenRecord, Rotation, TokenLedger, TokenRecord, ensure_future_expiry};

/// In-memory token ledger.
///
/// Intended for tests/dev. Lookups by token value scan the map.
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    records: RwLock<HashMap<TokenId, TokenRecord>>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (live or expired).
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records owned by `owner_id`.
    pub fn records_for(&self, owner_id: AccountId) -> Vec<TokenRecord> {
        match self.records.read() {
            Ok(map) => map.values().filter(|r| r.owner_id == owner_id).cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn find_by(&self, pred: impl Fn(&TokenRecord) -> bool) -> Result<TokenRecord, LedgerError> {
        let map = self
            .records
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        map.values().find(|r| pred(r)).cloned().ok_or(LedgerError::NotFound)
    }
}

fn collides(map: &HashMap<TokenId, TokenRecord>, skip: Option<TokenId>, access: &str, refresh: &str) -> bool {
    map.values()
        .filter(|r| Some(r.id) != skip)
        .any(|r| r.access_token == access || r.refresh_token == refresh)
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn create(&self, record: NewTokenRecord, now: DateTime<Utc>) -> Result<TokenRecord, LedgerError> {
        ensure_future_expiry(record.expires_at, now)?;

        let mut map = self
            .records
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        if collides(&map, None, &record.access_token, &record.refresh_token) {
            return Err(LedgerError::Duplicate);
        }

        let stored = TokenRecord {
            id: TokenId::new(),
            owner_id: record.owner_id,
            role: record.role,
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_at: record.expires_at,
            created_at: now,
        };
        map.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_access(&self, access_token: &str) -> Result<TokenRecord, LedgerError> {
        self.find_by(|r| r.access_token == access_token)
    }

    async fn find_by_refresh(&self, refresh_token: &str) -> Result<TokenRecord, LedgerError> {
        self.find_by(|r| r.refresh_token == refresh_token)
    }

    async fn rotate(
        &self,
        current: &TokenRecord,
        rotation: Rotation,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, LedgerError> {
        ensure_future_expiry(rotation.expires_at, now)?;

        // Check and swap under one write guard.
        let mut map = self
            .records
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        match map.get(&current.id) {
            None => return Err(LedgerError::NotFound),
            Some(stored)
                if stored.access_token != current.access_token
                    || stored.refresh_token != current.refresh_token =>
            {
                return Err(LedgerError::AlreadyRotated);
            }
            Some(_) => {}
        }

        let refresh = rotation
            .refresh_token
            .unwrap_or_else(|| current.refresh_token.clone());
        if collides(&map, Some(current.id), &rotation.access_token, &refresh) {
            return Err(LedgerError::Duplicate);
        }

        let stored = map.get_mut(&current.id).ok_or(LedgerError::NotFound)?;
        stored.access_token = rotation.access_token;
        stored.refresh_token = refresh;
        stored.expires_at = rotation.expires_at;
        Ok(stored.clone())
    }

    async fn revoke_all(&self, owner_id: AccountId) -> Result<u64, LedgerError> {
        let mut map = self
            .records
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        let before = map.len();
        map.retain(|_, r| r.owner_id != owner_id);
        Ok((before - map.len()) as u64)
    }
}
