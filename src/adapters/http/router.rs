//! Application router: routes plus the tower-http layer stack.

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::billing::billing_routes;
use super::state::AppState;
use super::webhooks::webhook_routes;
use crate::config::ServerConfig;

/// Builds the full application router.
///
/// # Routes
/// - `GET /health` - Liveness check
/// - `POST /api/webhooks/payments` - Payment processor webhooks (signature verified)
/// - `POST /api/billing/checkout`, `POST /api/billing/portal` - Bearer authenticated
pub fn app_router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .nest("/webhooks", webhook_routes(server.webhook_body_limit_bytes))
        .nest("/billing", billing_routes(state.auth.clone()));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(build_cors_layer(&server.cors_origins_list()))
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// CORS for the directory web app. With no origins configured, no
/// cross-origin requests are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = if origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600))
}
