//! Federated (OAuth authorization-code) login.
//!
//! The adapter owns the flow around an [`IdentityProvider`]:
//!
//! ```text
//! initiate(role)  → provider authorization URL, state = role tag
//! complete(...)   → check state/path role → exchange code → policy
//!                 → upsert account → issue + persist session
//! ```
//!
//! Account upsert and session creation are separate writes. If the second
//! fails the account stays and the error is surfaced.

pub mod google;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, info, instrument, warn};

use storefront_auth::{Account, NewAccount, Role};

use crate::auth_service::{AuthError, AuthService, IssuedSession};
use crate::identity::IdentityError;

pub use google::{GoogleConfig, GoogleProvider};

/// Identity asserted by the provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FederationError {
    #[error("missing authorization code")]
    MissingCode,

    #[error("invalid state parameter")]
    InvalidState,

    #[error("state role '{state}' does not match callback role '{path}'")]
    RoleMismatch { path: Role, state: Role },

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("provider did not return a verified email")]
    UnverifiedEmail,

    #[error("federated login is not permitted for this {0} account")]
    NotPermitted(Role),
}

impl From<FederationError> for AuthError {
    fn from(e: FederationError) -> Self {
        match e {
            FederationError::MissingCode | FederationError::InvalidState | FederationError::RoleMismatch { .. } => {
                AuthError::BadRequest(e.to_string())
            }
            FederationError::Exchange(_) | FederationError::UnverifiedEmail => AuthError::Upstream(e.to_string()),
            FederationError::NotPermitted(_) => AuthError::Forbidden(e.to_string()),
        }
    }
}

/// External identity provider boundary.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the user agent is redirected to in order to sign in.
    fn authorization_url(&self, role: Role, state: &str) -> String;

    /// Exchange an authorization code for the verified identity. Not retried.
    async fn exchange(&self, role: Role, code: &str) -> Result<ExternalIdentity, FederationError>;
}

/// Who may sign in as admin through the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AdminFederation {
    #[default]
    Disabled,
    AllowList(Vec<String>),
    AnyVerified,
}

impl AdminFederation {
    /// Consumer and supplier federation is always permitted.
    pub fn permits(&self, role: Role, email: &str) -> bool {
        match (role, self) {
            (Role::Consumer | Role::Supplier, _) => true,
            (Role::Admin, AdminFederation::Disabled) => false,
            (Role::Admin, AdminFederation::AllowList(emails)) => emails.iter().any(|e| e == email),
            (Role::Admin, AdminFederation::AnyVerified) => true,
        }
    }
}

/// Result of a completed federated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederatedLogin {
    #[serde(flatten)]
    pub session: IssuedSession,
    pub email: String,
    pub name: String,
}

#[derive(Clone)]
pub struct FederationAdapter {
    auth: AuthService,
    provider: Arc<dyn IdentityProvider>,
    admin_policy: AdminFederation,
}

impl core::fmt::Debug for FederationAdapter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FederationAdapter")
            .field("admin_policy", &self.admin_policy)
            .finish_non_exhaustive()
    }
}

impl FederationAdapter {
    pub fn new(auth: AuthService, provider: Arc<dyn IdentityProvider>, admin_policy: AdminFederation) -> Self {
        Self {
            auth,
            provider,
            admin_policy,
        }
    }

    /// Authorization URL for `role`; the role tag travels as `state`.
    pub fn initiate(&self, role: Role) -> String {
        self.provider.authorization_url(role, role.as_str())
    }

    #[instrument(skip(self, code, state), fields(role = %path_role), err(level = Level::DEBUG))]
    pub async fn complete(
        &self,
        path_role: Role,
        code: Option<&str>,
        state: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FederatedLogin, AuthError> {
        let state_role: Role = state
            .and_then(|s| s.parse().ok())
            .ok_or(FederationError::InvalidState)?;
        if state_role != path_role {
            return Err(FederationError::RoleMismatch {
                path: path_role,
                state: state_role,
            }
            .into());
        }
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(FederationError::MissingCode)?;

        let identity = self.provider.exchange(path_role, code).await.map_err(|e| {
            warn!(error = %e, "identity provider exchange failed");
            e
        })?;

        if !self.admin_policy.permits(path_role, &identity.email) {
            return Err(FederationError::NotPermitted(path_role).into());
        }

        let account = self.upsert_account(path_role, &identity, now).await?;
        let session = self.auth.issue_session(account.id, path_role, now).await?;

        Ok(FederatedLogin {
            session,
            email: account.email,
            name: account.display_name,
        })
    }

    async fn upsert_account(
        &self,
        role: Role,
        identity: &ExternalIdentity,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        let identities = self.auth.identities();

        let existing = match identities.find_by_email(role, &identity.email).await? {
            Some(account) => account,
            None => {
                let new = NewAccount::federated(role, identity.email.clone(), identity.name.clone());
                match identities.create(new, now).await {
                    Ok(created) => {
                        info!(account_id = %created.id, "federated account created");
                        return Ok(created);
                    }
                    // Lost a race with another first login for the same email.
                    Err(IdentityError::EmailTaken(_)) => identities
                        .find_by_email(role, &identity.email)
                        .await?
                        .ok_or(AuthError::NotFound)?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if !existing.is_active() {
            return Err(AuthError::Forbidden("account is deactivated".to_string()));
        }
        if existing.display_name != identity.name {
            return Ok(identities
                .update_display_name(role, existing.id, &identity.name)
                .await?);
        }
        Ok(existing)
    }
}
