//! Infrastructure layer: persistence backends, token validation, session
//! orchestration and the federated identity provider.

pub mod auth_service;
pub mod federation;
pub mod identity;
pub mod ledger;
pub mod validator;

pub use auth_service::{AuthError, AuthService, IssuedSession, Unauthenticated, default_refresh_ttl, max_refresh_ttl};
pub use federation::{
    AdminFederation, ExternalIdentity, FederatedLogin, FederationAdapter, FederationError, GoogleConfig,
    GoogleProvider, IdentityProvider,
};
pub use identity::{IdentityError, IdentityStore, InMemoryIdentityStore, PostgresIdentityStore};
pub use ledger::{
    InMemoryTokenLedger, LedgerError, NewTokenRecord, PostgresTokenLedger, Rotation, TokenLedger, TokenRecord,
};
pub use validator::{TokenValidator, ValidationError, extract_bearer};
