//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod billing;
pub mod webhook;

pub use billing::{
    BillingError, CreateBillingPortalCommand, CreateBillingPortalHandler,
    CreateFeaturedCheckoutCommand, CreateFeaturedCheckoutHandler,
};
pub use webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, ListingWebhookDispatcher,
};
