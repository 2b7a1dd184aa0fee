//! Payment webhook handlers.

mod handle_payment_webhook;
mod listing_handlers;

pub use handle_payment_webhook::{HandlePaymentWebhookCommand, HandlePaymentWebhookHandler};
pub use listing_handlers::{
    CheckoutCompletedHandler, InvoicePaidHandler, InvoicePaymentFailedHandler,
    ListingWebhookDispatcher, SubscriptionDeletedHandler, SubscriptionSyncHandler,
};
