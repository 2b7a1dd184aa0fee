//! HTTP handlers for billing endpoints.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::AppState;
use crate::application::{
    BillingError, CreateBillingPortalCommand, CreateFeaturedCheckoutCommand,
};

use super::dto::{ListingBillingRequest, RedirectResponse};

/// POST /api/billing/checkout - Start the featured subscription checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<ListingBillingRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreateFeaturedCheckoutCommand {
        listing_id: request.listing_id,
        user_id: identity.user_id,
        email: identity.email,
        success_url: state.billing_urls.checkout_success.clone(),
        cancel_url: state.billing_urls.checkout_cancel.clone(),
    };

    let session = state.checkout_handler().handle(cmd).await?;

    Ok(Json(RedirectResponse { url: session.url }))
}

/// POST /api/billing/portal - Open the customer billing portal
pub async fn create_portal(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<ListingBillingRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreateBillingPortalCommand {
        listing_id: request.listing_id,
        user_id: identity.user_id,
        return_url: state.billing_urls.portal_return.clone(),
    };

    let session = state.portal_handler().handle(cmd).await?;

    Ok(Json(RedirectResponse { url: session.url }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(pub BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self.0 {
            BillingError::ListingNotFound(_) => {
                (StatusCode::NOT_FOUND, "LISTING_NOT_FOUND", "Listing not found")
            }
            BillingError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Listing belongs to another practitioner",
            ),
            BillingError::AlreadyFeatured => (
                StatusCode::CONFLICT,
                "ALREADY_FEATURED",
                "Listing already has an active featured subscription",
            ),
            BillingError::NoBillingAccount => (
                StatusCode::CONFLICT,
                "NO_BILLING_ACCOUNT",
                "Listing has no billing account yet",
            ),
            BillingError::Payment(e) => {
                tracing::error!(error = %e, "Payment provider request failed");
                let status = if e.retryable {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, "PAYMENT_PROVIDER_ERROR", "Payment provider error")
            }
            BillingError::Store(e) => {
                tracing::error!(error = %e, "Backend store request failed");
                let status = if e.is_transient() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, "INTERNAL_ERROR", "Internal error")
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
