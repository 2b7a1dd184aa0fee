//! Provider Directory - practitioner directory backend
//!
//! Serves the billing side of the directory: practitioners buy a featured
//! listing through the payment processor's hosted checkout, and the
//! processor's signed webhooks drive each listing's featured state.
//!
//! Every inbound webhook is authenticated (HMAC-SHA256 over the timestamp and
//! raw body, with a freshness window) before anything in it is trusted.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
