use axum::{
    Router,
    routing::{delete, get, post},
};

use storefront_auth::Role;

use crate::middleware::require_role;

pub mod auth;
pub mod federation;
pub mod portal;
pub mod system;

/// Routes reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/:role/login", post(auth::login))
        .route("/auth/google/login/:role", get(federation::google_login))
        .route("/auth/google/callback/:role", get(federation::google_callback))
}

/// Routes requiring an authenticated principal; role-scoped groups carry
/// their own gate.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/auth/revoke", post(auth::revoke))
        .merge(gated(
            Role::Admin,
            Router::new()
                .route("/admin/dashboard", get(portal::admin_dashboard))
                .route("/admin/accounts/:role/:id", delete(portal::deactivate_account)),
        ))
        .merge(gated(
            Role::Consumer,
            Router::new().route("/consumer/home", get(portal::consumer_home)),
        ))
        .merge(gated(
            Role::Supplier,
            Router::new().route("/supplier/portal", get(portal::supplier_portal)),
        ))
}

fn gated(role: Role, router: Router) -> Router {
    router.route_layer(axum::middleware::from_fn_with_state(role, require_role))
}
