//! Request and response bodies for billing endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ListingId;

/// Body of `POST /api/billing/checkout` and `POST /api/billing/portal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingBillingRequest {
    pub listing_id: ListingId,
}

/// Hosted page the browser should be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectResponse {
    pub url: String,
}
