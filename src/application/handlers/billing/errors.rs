//! Errors for billing session handlers.

use thiserror::Error;

use crate::domain::foundation::ListingId;
use crate::ports::{PaymentError, StoreError};

#[derive(Debug, Clone, Error)]
pub enum BillingError {
    #[error("Listing not found: {0}")]
    ListingNotFound(ListingId),

    #[error("Listing belongs to another practitioner")]
    Forbidden,

    #[error("Listing is already featured")]
    AlreadyFeatured,

    #[error("Listing has no billing account yet")]
    NoBillingAccount,

    #[error("Payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
