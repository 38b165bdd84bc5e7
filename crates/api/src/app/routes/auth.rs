//! Password login, refresh and revocation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::app::dto::{LoginRequest, RefreshRequest, TokenResponse};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

/// POST /auth/:role/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Path(role): Path<String>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let role = match errors::parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.auth.login(role, &body.email, &body.password, Utc::now()).await {
        Ok(session) => (StatusCode::OK, Json(TokenResponse::from(session))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/refresh
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    if body.refresh_token.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", "refresh_token is required");
    }

    match services.auth.refresh(&body.refresh_token, Utc::now()).await {
        Ok(session) => (StatusCode::OK, Json(TokenResponse::from(session))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /auth/revoke - drop every token of the caller
pub async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.auth.revoke_all(principal.account_id()).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
