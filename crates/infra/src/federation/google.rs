//! Google OAuth 2.0 provider (authorization-code flow, userinfo v2).

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use storefront_auth::Role;

use super::{ExternalIdentity, FederationError, IdentityProvider};

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: &str = "https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback base; the role is appended as the last path segment.
    pub redirect_base: String,
}

impl GoogleConfig {
    pub fn redirect_uri(&self, role: Role) -> String {
        format!("{}/{}", self.redirect_base.trim_end_matches('/'), role)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    verified_email: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_token(&self, role: Role, code: &str) -> Result<String, FederationError> {
        let redirect_uri = self.config.redirect_uri(role);
        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| FederationError::Exchange(format!("unable to contact token endpoint: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FederationError::Exchange(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FederationError::Exchange(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, FederationError> {
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| FederationError::Exchange(format!("unable to contact userinfo endpoint: {e}")))?;

        if !response.status().is_success() {
            return Err(FederationError::Exchange(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FederationError::Exchange(format!("invalid userinfo response: {e}")))
    }
}

/// Turn a userinfo payload into an identity, rejecting missing or unverified emails.
fn identity_from(info: UserInfo) -> Result<ExternalIdentity, FederationError> {
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or(FederationError::UnverifiedEmail)?;
    if info.verified_email == Some(false) {
        return Err(FederationError::UnverifiedEmail);
    }
    Ok(ExternalIdentity {
        email,
        name: info.name.unwrap_or_default(),
    })
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, role: Role, state: &str) -> String {
        let redirect_uri = self.config.redirect_uri(role);
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("access_type", "offline"),
            ("state", state),
        ];
        Url::parse_with_params(AUTH_URL, &params)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| AUTH_URL.to_string())
    }

    async fn exchange(&self, role: Role, code: &str) -> Result<ExternalIdentity, FederationError> {
        let access_token = self.fetch_token(role, code).await?;
        let info = self.fetch_userinfo(&access_token).await?;
        identity_from(info)
    }
}
