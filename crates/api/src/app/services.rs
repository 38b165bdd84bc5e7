//! Service wiring: stores, issuer, hasher, federation.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use storefront_auth::{IssuerError, PasswordError, PasswordHasher, Role, SigningKey, TokenIssuer};
use storefront_infra::{
    AuthError, AuthService, FederationAdapter, GoogleProvider, IdentityStore, InMemoryIdentityStore,
    InMemoryTokenLedger, PostgresIdentityStore, PostgresTokenLedger, TokenLedger, TokenValidator,
};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Issuer(#[from] IssuerError),

    #[error(transparent)]
    Hashing(#[from] PasswordError),

    #[error("failed to connect to postgres: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to bootstrap admin account: {0}")]
    Bootstrap(#[from] AuthError),
}

/// Everything a request handler needs.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub auth: AuthService,
    /// `None` when no identity provider is configured.
    pub federation: Option<FederationAdapter>,
}

impl AppServices {
    pub fn new(auth: AuthService, federation: Option<FederationAdapter>) -> Self {
        Self { auth, federation }
    }

    pub fn validator(&self) -> TokenValidator {
        self.auth.validator()
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// in-memory stores otherwise. Seeds the bootstrap admin if configured.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    let (identities, ledger): (Arc<dyn IdentityStore>, Arc<dyn TokenLedger>) = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url).await?;
            tracing::info!("using postgres stores");
            (
                Arc::new(PostgresIdentityStore::new(pool.clone())),
                Arc::new(PostgresTokenLedger::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            (
                Arc::new(InMemoryIdentityStore::new()),
                Arc::new(InMemoryTokenLedger::new()),
            )
        }
    };

    let issuer = TokenIssuer::new(SigningKey::new(&config.jwt_secret)?, config.access_ttl)?;
    let hasher = PasswordHasher::new(config.hashing)?;
    let auth = AuthService::new(identities, ledger, issuer, hasher).with_refresh_ttl(config.refresh_ttl);

    let federation = config.google.clone().map(|google| {
        FederationAdapter::new(
            auth.clone(),
            Arc::new(GoogleProvider::new(google)),
            config.admin_federation.clone(),
        )
    });
    if federation.is_none() {
        tracing::info!("google federation not configured");
    }

    if let Some(admin) = &config.bootstrap_admin {
        let account = auth
            .ensure_account(Role::Admin, &admin.email, &admin.password, "Administrator", Utc::now())
            .await?;
        tracing::info!(account_id = %account.id, "bootstrap admin ready");
    }

    Ok(AppServices::new(auth, federation))
}
