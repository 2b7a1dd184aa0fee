//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port: hosted checkout for the featured
//! tier and the customer billing portal. Webhook verification lives in the
//! domain (`domain::webhook`), not here.
//!
//! # Security
//!
//! - The secret key is held as `secrecy::SecretString` and never logged

mod stripe_adapter;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
