//! Bearer token validation: header → `Principal`.
//!
//! Checks run in order and stop at the first failure:
//!
//! 1. header present and of the form `Bearer <token>`
//! 2. signature and claim structure
//! 3. embedded expiry
//! 4. a live ledger row for the exact access token (revocation)
//! 5. the row's own expiry
//!
//! The principal is built from the ledger row, never from the claims alone.
//! Validation only reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use storefront_auth::{Principal, TokenIssuer, TokenValidationError};

use crate::ledger::{LedgerError, TokenLedger};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("authorization header is not a bearer token")]
    MalformedHeader,

    #[error("malformed or unverifiable token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("token revoked")]
    Revoked,

    /// The ledger could not be read. Callers treat this as unauthenticated.
    #[error("token ledger unavailable")]
    Unavailable,
}

impl From<TokenValidationError> for ValidationError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::Expired => ValidationError::Expired,
            TokenValidationError::Malformed
            | TokenValidationError::NotYetValid
            | TokenValidationError::InvalidTimeWindow => ValidationError::Malformed,
        }
    }
}

/// Extract the token from a raw `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, ValidationError> {
    let header = header.ok_or(ValidationError::MissingHeader)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ValidationError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(ValidationError::MalformedHeader);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct TokenValidator {
    issuer: TokenIssuer,
    ledger: Arc<dyn TokenLedger>,
}

impl core::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    pub fn new(issuer: TokenIssuer, ledger: Arc<dyn TokenLedger>) -> Self {
        Self { issuer, ledger }
    }

    /// Validate a raw `Authorization` header value.
    pub async fn validate_header(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Principal, ValidationError> {
        let token = extract_bearer(header)?;
        self.validate(token, now).await
    }

    /// Validate a bare access token.
    pub async fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, ValidationError> {
        self.issuer.decode(token, now)?;

        let record = match self.ledger.find_by_access(token).await {
            Ok(record) => record,
            Err(LedgerError::NotFound) => return Err(ValidationError::Revoked),
            Err(e) => {
                warn!(error = %e, "token ledger read failed during validation");
                return Err(ValidationError::Unavailable);
            }
        };

        if record.expires_at <= now {
            return Err(ValidationError::Expired);
        }

        Ok(Principal::new(record.owner_id, record.role))
    }
}
