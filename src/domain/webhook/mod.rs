//! Payment webhook authentication and processing.
//!
//! - `signature` - HMAC-SHA256 authentication of raw webhook bodies
//! - `event` - Event envelope parsed after authentication
//! - `processor` - At-most-once dispatch per event id
//! - `errors` - Error taxonomy with HTTP status mapping

mod errors;
mod event;
mod processor;
mod signature;

pub use errors::WebhookError;
pub use event::{PaymentEvent, PaymentEventData, PaymentEventKind};
pub use processor::{
    IdempotentWebhookProcessor, WebhookDispatcher, WebhookEventHandler, DEFAULT_CLAIM_LEASE_SECS,
};
pub use signature::{
    compute_signature, verify, SignatureHeader, WebhookAuthenticator, DEFAULT_TOLERANCE_SECS,
};

#[cfg(test)]
pub use event::PaymentEventBuilder;
