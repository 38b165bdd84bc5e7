use serde::Serialize;

use storefront_core::AccountId;

use crate::Role;

/// An authenticated caller for the duration of one request.
///
/// Produced only by successful token validation and never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub role: Role,
}

impl Principal {
    pub fn new(account_id: AccountId, role: Role) -> Self {
        Self { account_id, role }
    }
}
