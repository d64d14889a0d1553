//! Application routing
//!
//! There is a single catch-all route; the path belongs to the upstream API.

use axum::{middleware, routing::any, Router};
use tower_http::catch_panic::CatchPanicLayer;

use crate::api::proxy;
use crate::middleware::{
    auth::{require_auth_code, AuthState},
    cors::{create_cors_layer, handle_panic},
    logging::log_request,
};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let auth_state = AuthState::new(state.settings.clone());

    // Layer order: last added = outermost = runs first.
    // log -> cors (answers preflight) -> panic guard -> auth -> proxy
    Router::new()
        .route("/", any(proxy::forward))
        .route("/*path", any(proxy::forward))
        .layer(middleware::from_fn_with_state(auth_state, require_auth_code))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(create_cors_layer())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
