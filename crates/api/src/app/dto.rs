use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_auth::Role;
use storefront_infra::{FederatedLogin, IssuedSession};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedSession> for TokenResponse {
    fn from(s: IssuedSession) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FederatedLoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Role,
    pub email: String,
    pub name: String,
    pub login_method: &'static str,
}

impl From<FederatedLogin> for FederatedLoginResponse {
    fn from(login: FederatedLogin) -> Self {
        Self {
            access_token: login.session.access_token,
            refresh_token: login.session.refresh_token,
            expires_at: login.session.expires_at,
            role: login.session.role,
            email: login.email,
            name: login.name,
            login_method: "google",
        }
    }
}
