//! Google sign-in: redirect to the provider and handle its callback.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use chrono::Utc;

use storefront_infra::FederationAdapter;

use crate::app::dto::{CallbackQuery, FederatedLoginResponse};
use crate::app::{errors, services::AppServices};

fn adapter(services: &AppServices) -> Result<&FederationAdapter, axum::response::Response> {
    services.federation.as_ref().ok_or_else(|| {
        errors::json_error(
            StatusCode::NOT_FOUND,
            "federation_disabled",
            "federated login is not configured",
        )
    })
}

/// GET /auth/google/login/:role
pub async fn google_login(
    Extension(services): Extension<Arc<AppServices>>,
    Path(role): Path<String>,
) -> axum::response::Response {
    let role = match errors::parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    match adapter(&services) {
        Ok(adapter) => Redirect::temporary(&adapter.initiate(role)).into_response(),
        Err(resp) => resp,
    }
}

/// GET /auth/google/callback/:role?code&state
pub async fn google_callback(
    Extension(services): Extension<Arc<AppServices>>,
    Path(role): Path<String>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> axum::response::Response {
    let role = match errors::parse_role(&role) {
        Ok(role) => role,
        Err(resp) => return resp,
    };
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let adapter = match adapter(&services) {
        Ok(adapter) => adapter,
        Err(resp) => return resp,
    };

    match adapter
        .complete(role, query.code.as_deref(), query.state.as_deref(), Utc::now())
        .await
    {
        Ok(login) => (StatusCode::OK, Json(FederatedLoginResponse::from(login))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
