//! `storefront-auth`: authentication and authorization primitives.
//!
//! Decoupled from HTTP and storage: hashing, token minting/verification,
//! claims, roles and the role gate. Persistence lives in `storefront-infra`.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod issuer;
pub mod password;
pub mod principal;
pub mod roles;

pub use account::{Account, AccountProfile, NewAccount};
pub use authorize::{AuthzError, require};
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use issuer::{IssuedAccess, IssuerError, SigningKey, TokenIssuer, default_access_ttl, max_access_ttl};
pub use password::{HashingParams, PasswordError, PasswordHasher};
pub use principal::Principal;
pub use roles::{Role, UnknownRole};
