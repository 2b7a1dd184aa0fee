//! Shared application state for the HTTP adapters.

use std::sync::Arc;

use axum::http::HeaderName;

use crate::application::{
    CreateBillingPortalHandler, CreateFeaturedCheckoutHandler, HandlePaymentWebhookHandler,
    ListingStore,
};
use crate::ports::{BackendAuth, PaymentProvider};

/// Redirect targets handed to the hosted billing pages.
#[derive(Debug, Clone)]
pub struct BillingUrls {
    pub checkout_success: String,
    pub checkout_cancel: String,
    pub portal_return: String,
}

/// Shared application state containing all dependencies.
///
/// Cloned for each request; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub webhook_handler: Arc<HandlePaymentWebhookHandler>,
    /// Request header carrying the webhook signature.
    pub signature_header: HeaderName,
    pub listings: ListingStore,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub auth: Arc<dyn BackendAuth>,
    pub billing_urls: BillingUrls,
}

impl AppState {
    pub fn checkout_handler(&self) -> CreateFeaturedCheckoutHandler {
        CreateFeaturedCheckoutHandler::new(self.listings.clone(), self.payment_provider.clone())
    }

    pub fn portal_handler(&self) -> CreateBillingPortalHandler {
        CreateBillingPortalHandler::new(self.listings.clone(), self.payment_provider.clone())
    }
}
