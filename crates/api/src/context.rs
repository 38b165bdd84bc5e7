use storefront_auth::{Principal, Role};
use storefront_core::AccountId;

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; absent on public routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn account_id(&self) -> AccountId {
        self.principal.account_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }
}
