//! Role-scoped landing endpoints and admin account management.
//!
//! Each handler is mounted behind the role gate for its role.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use storefront_core::AccountId;

use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

/// GET /admin/dashboard
pub async fn admin_dashboard(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome, admin",
        "account_id": principal.account_id().to_string(),
    }))
}

/// GET /consumer/home
pub async fn consumer_home(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome, consumer",
        "account_id": principal.account_id().to_string(),
    }))
}

/// GET /supplier/portal
pub async fn supplier_portal(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome, supplier",
        "account_id": principal.account_id().to_string(),
    }))
}

/// DELETE /admin/accounts/:role/:id - soft-delete an account and revoke its tokens
pub async fn deactivate_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path((role, id)): Path<(String, String)>,
) -> axum::response::Response {
    let role = match errors::parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    let id: AccountId = match id.parse() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}")),
    };

    match services.auth.deactivate_account(role, id, Utc::now()).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
