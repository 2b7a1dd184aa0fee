//! HTTP adapter for inbound payment webhooks.
//!
//! - `POST /api/webhooks/payments` - signed payment processor events

mod handlers;

pub use handlers::{handle_payment_webhook, webhook_routes, WebhookApiError};
