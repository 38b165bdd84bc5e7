use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use storefront_auth::{Role, require};
use storefront_infra::{TokenValidator, ValidationError};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub validator: TokenValidator,
}

/// Resolve the bearer token to a principal and attach it to the request.
pub async fn auth_middleware(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .map(|v| v.to_str().map_err(|_| ValidationError::MalformedHeader));

    let principal = match header {
        Some(Err(e)) => Err(e),
        Some(Ok(value)) => state.validator.validate_header(Some(value), Utc::now()).await,
        None => state.validator.validate_header(None, Utc::now()).await,
    };

    match principal {
        Ok(principal) => {
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "request not authenticated");
            json_error(StatusCode::UNAUTHORIZED, validation_code(&e), e.to_string())
        }
    }
}

/// Role gate. Must run after [`auth_middleware`].
pub async fn require_role(State(role): State<Role>, req: Request, next: Next) -> Response {
    let principal = req.extensions().get::<PrincipalContext>().map(|p| *p.principal());
    match require(principal.as_ref(), role) {
        Ok(()) => next.run(req).await,
        Err(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    }
}

fn validation_code(e: &ValidationError) -> &'static str {
    match e {
        ValidationError::MissingHeader | ValidationError::MalformedHeader => "missing_credentials",
        ValidationError::Malformed => "invalid_token",
        ValidationError::Expired => "token_expired",
        ValidationError::Revoked => "token_revoked",
        ValidationError::Unavailable => "unauthenticated",
    }
}
