//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod listings;
pub mod notifications;

pub use handlers::{
    BillingError, CreateBillingPortalCommand, CreateBillingPortalHandler,
    CreateFeaturedCheckoutCommand, CreateFeaturedCheckoutHandler, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, ListingWebhookDispatcher,
};
pub use listings::ListingStore;
pub use notifications::BillingNotifier;
