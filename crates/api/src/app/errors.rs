use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_auth::Role;
use storefront_infra::{AuthError, Unauthenticated};

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        AuthError::Unauthenticated(reason) => {
            let code = match reason {
                Unauthenticated::BadCredentials => "invalid_credentials",
                Unauthenticated::UnknownRefreshToken => "invalid_refresh_token",
                Unauthenticated::RefreshExpired => "refresh_token_expired",
                Unauthenticated::InactiveAccount => "account_inactive",
                Unauthenticated::Token(_) => "invalid_token",
            };
            json_error(StatusCode::UNAUTHORIZED, code, reason.to_string())
        }
        AuthError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        AuthError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        AuthError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AuthError::Upstream(msg) => json_error(StatusCode::BAD_GATEWAY, "upstream_error", msg),
        AuthError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "storage failure")
        }
        AuthError::Internal(msg) => {
            tracing::error!(error = %msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Every body rejection (syntax, shape, content type) is a plain 400.
pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())
}

pub fn parse_role(s: &str) -> Result<Role, axum::response::Response> {
    s.parse::<Role>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_role", e.to_string()))
}
