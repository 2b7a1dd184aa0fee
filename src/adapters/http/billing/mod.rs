//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/billing/checkout` - Start the featured subscription checkout
//! - `POST /api/billing/portal` - Open the customer billing portal

pub mod dto;
mod handlers;
mod routes;

pub use handlers::{create_checkout, create_portal, BillingApiError};
pub use routes::billing_routes;
