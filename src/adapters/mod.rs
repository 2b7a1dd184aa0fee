//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `backend` - Hosted backend (REST gateway, in-memory)
//! - `email` - Transactional email (Resend, log-only)
//! - `http` - Axum routes, middleware and error mapping
//! - `stripe` - Stripe checkout and billing portal
//! - `webhook` - Webhook idempotency records

pub mod backend;
pub mod email;
pub mod http;
pub mod stripe;
pub mod webhook;

pub use backend::{InMemoryBackend, RestBackendClient};
pub use email::{LogEmailSender, ResendEmailSender};
pub use http::{app_router, AppState, BillingUrls};
pub use stripe::{StripeConfig, StripePaymentAdapter};
pub use webhook::{InMemoryWebhookEventRepository, StoreWebhookEventRepository};
