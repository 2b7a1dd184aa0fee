//! Payment webhook endpoint.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::state::AppState;
use crate::application::HandlePaymentWebhookCommand;
use crate::domain::webhook::WebhookError;
use crate::ports::WebhookResult;

/// Routes mounted under `/api/webhooks`. No user auth; requests are
/// authenticated by their signature. Bodies over `max_body_bytes` get 413
/// before any signature work.
pub fn webhook_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/payments", post(handle_payment_webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// POST /api/webhooks/payments
///
/// The body is taken as raw bytes; it must reach the authenticator exactly
/// as it was signed.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(&state.signature_header)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = state
        .webhook_handler
        .handle(HandlePaymentWebhookCommand {
            payload: body.to_vec(),
            signature,
        })
        .await?;

    if result == WebhookResult::AlreadyProcessed {
        tracing::debug!("Duplicate payment webhook acknowledged");
    }

    Ok(Json(json!({ "received": true })))
}

/// Converts webhook errors to responses the processor understands:
/// 4xx stops redelivery, 5xx asks for it.
#[derive(Debug)]
pub struct WebhookApiError(pub WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_success() {
            return Json(json!({ "received": true })).into_response();
        }

        let code = match status {
            StatusCode::UNAUTHORIZED => "INVALID_SIGNATURE",
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            StatusCode::SERVICE_UNAVAILABLE => "IN_PROGRESS",
            _ => "INTERNAL_ERROR",
        };
        (
            status,
            Json(ErrorResponse::new(code, self.0.public_message())),
        )
            .into_response()
    }
}
