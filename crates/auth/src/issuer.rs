//! Access-token minting and verification (HS256), refresh-token generation.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::AccountId;

use crate::claims::{AccessClaims, TokenValidationError, validate_claims};
use crate::Role;

/// Bytes of entropy in a refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 32;

pub fn default_access_ttl() -> Duration {
    Duration::minutes(15)
}

/// Upper bound accepted by [`TokenIssuer::new`].
pub fn max_access_ttl() -> Duration {
    Duration::days(1)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssuerError {
    #[error("signing key must not be empty")]
    EmptyKey,

    #[error("access token ttl must be between one second and one day")]
    InvalidTtl,

    #[error("access token expiry is out of range")]
    ExpiryOutOfRange,

    #[error("failed to sign access token: {0}")]
    Signing(String),
}

/// HMAC secret shared by issuance and validation.
///
/// Injected explicitly so independent signing domains can coexist.
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, IssuerError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(IssuerError::EmptyKey);
        }
        Ok(Self(Arc::from(secret)))
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// A freshly minted access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAccess {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(key: SigningKey, access_ttl: Duration) -> Result<Self, IssuerError> {
        if access_ttl < Duration::seconds(1) || access_ttl > max_access_ttl() {
            return Err(IssuerError::InvalidTtl);
        }

        // Expiry is checked against the caller's clock in `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(&key.0),
            decoding: DecodingKey::from_secret(&key.0),
            validation,
            access_ttl,
        })
    }

    /// Mint a signed access token for `owner` acting as `role`.
    ///
    /// `iat` is `now` truncated to whole seconds; the returned expiry is
    /// exactly the `exp` claim.
    pub fn issue_access(
        &self,
        owner: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccess, IssuerError> {
        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(self.access_ttl)
            .ok_or(IssuerError::ExpiryOutOfRange)?;
        let claims = AccessClaims {
            sub: owner,
            role,
            jti: Uuid::new_v4(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| IssuerError::Signing(e.to_string()))?;

        Ok(IssuedAccess { token, expires_at })
    }

    /// Opaque high-entropy refresh token (URL-safe base64, no padding).
    pub fn issue_refresh(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Verify signature and structure, then the claim time window.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| TokenValidationError::Malformed)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(SigningKey::new(secret).unwrap(), default_access_ttl()).unwrap()
    }

    #[test]
    fn issued_token_decodes_to_its_claims() {
        let issuer = issuer("test-secret");
        let owner = AccountId::new();
        let now = Utc::now();

        let issued = issuer.issue_access(owner, Role::Consumer, now).unwrap();
        let claims = issuer.decode(&issued.token, now).unwrap();

        assert_eq!(claims.sub, owner);
        assert_eq!(claims.role, Role::Consumer);
        assert_eq!(claims.expires_at(), Some(issued.expires_at));
        assert!(issued.expires_at > now);
        assert!(issued.expires_at <= now + default_access_ttl());
    }

    #[test]
    fn foreign_key_is_malformed() {
        let now = Utc::now();
        let issued = issuer("key-a").issue_access(AccountId::new(), Role::Admin, now).unwrap();
        assert_eq!(
            issuer("key-b").decode(&issued.token, now),
            Err(TokenValidationError::Malformed)
        );
    }

    #[test]
    fn garbage_and_tampered_tokens_are_malformed() {
        let issuer = issuer("test-secret");
        let now = Utc::now();
        assert_eq!(issuer.decode("not.a.jwt", now), Err(TokenValidationError::Malformed));
        assert_eq!(issuer.decode("", now), Err(TokenValidationError::Malformed));

        let mut token = issuer.issue_access(AccountId::new(), Role::Admin, now).unwrap().token;
        token.push('x');
        assert_eq!(issuer.decode(&token, now), Err(TokenValidationError::Malformed));
    }

    #[test]
    fn expired_after_ttl() {
        let issuer = issuer("test-secret");
        let now = Utc::now();
        let issued = issuer.issue_access(AccountId::new(), Role::Supplier, now).unwrap();
        assert_eq!(
            issuer.decode(&issued.token, issued.expires_at),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn same_second_issues_are_distinct() {
        let issuer = issuer("test-secret");
        let owner = AccountId::new();
        let now = Utc::now();
        let a = issuer.issue_access(owner, Role::Consumer, now).unwrap();
        let b = issuer.issue_access(owner, Role::Consumer, now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn refresh_tokens_are_long_and_unique() {
        let issuer = issuer("test-secret");
        let tokens: HashSet<String> = (0..64).map(|_| issuer.issue_refresh()).collect();
        assert_eq!(tokens.len(), 64);
        for t in &tokens {
            assert_eq!(URL_SAFE_NO_PAD.decode(t).unwrap().len(), REFRESH_TOKEN_BYTES);
        }
    }

    #[test]
    fn rejects_misconfiguration() {
        assert_eq!(SigningKey::new("").unwrap_err(), IssuerError::EmptyKey);
        let key = SigningKey::new("k").unwrap();
        assert_eq!(
            TokenIssuer::new(key.clone(), Duration::milliseconds(500)).unwrap_err(),
            IssuerError::InvalidTtl
        );
        assert_eq!(
            TokenIssuer::new(key, Duration::seconds(1_000_000_000_000_000)).unwrap_err(),
            IssuerError::InvalidTtl
        );
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error() {
        let issuer = TokenIssuer::new(SigningKey::new("k").unwrap(), max_access_ttl()).unwrap();
        assert_eq!(
            issuer.issue_access(AccountId::new(), Role::Admin, DateTime::<Utc>::MAX_UTC),
            Err(IssuerError::ExpiryOutOfRange)
        );
    }
}
