use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: no authenticated principal")]
    Anonymous,

    #[error("forbidden: role '{actual}' cannot access '{required}' resources")]
    RoleMismatch { required: Role, actual: Role },
}

/// Require `principal` to hold exactly `expected`.
///
/// - No IO
/// - No hierarchy: an admin does not satisfy a supplier-only gate
/// - A missing principal is always rejected
pub fn require(principal: Option<&Principal>, expected: Role) -> Result<(), AuthzError> {
    let principal = principal.ok_or(AuthzError::Anonymous)?;
    if principal.role == expected {
        Ok(())
    } else {
        Err(AuthzError::RoleMismatch {
            required: expected,
            actual: principal.role,
        })
    }
}
