use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use storefront_core::AccountId;

use crate::Role;

/// Accepted clock skew for `iat` when tokens are minted by another instance.
pub const ISSUED_AT_LEEWAY_SECS: i64 = 30;

/// Access-token claims.
///
/// Timestamps are Unix seconds, as JWT registered claims require. `jti` keeps
/// two tokens minted for the same account within one second distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the owning account.
    pub sub: AccountId,

    /// Role the token was issued for.
    pub role: Role,

    /// Unique token id.
    pub jti: Uuid,

    /// Issued-at (seconds since epoch).
    pub iat: i64,

    /// Expiration (seconds since epoch).
    pub exp: i64,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token signature or encoding is invalid")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Check the claim time window against `now`.
///
/// Expiry is exclusive: a token whose `exp` equals `now` is already expired.
/// Signature verification happens before this, in the issuer.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now + ISSUED_AT_LEEWAY_SECS < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if claims.exp <= now {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
