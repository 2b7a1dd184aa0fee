//! Axum router configuration for billing endpoints.

use axum::{middleware, routing::post, Router};

use super::handlers::{create_checkout, create_portal};
use crate::adapters::http::middleware::{auth_middleware, AuthState};
use crate::adapters::http::state::AppState;

/// Create the billing API router.
///
/// # Routes (require authentication)
/// - `POST /checkout` - Start featured subscription checkout
/// - `POST /portal` - Open the billing portal
pub fn billing_routes(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware))
}
