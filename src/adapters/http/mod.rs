//! HTTP adapters - REST API implementations.
//!
//! Each area has its own adapter module; `app_router` assembles them.

pub mod billing;
pub mod error;
pub mod middleware;
mod router;
mod state;
pub mod webhooks;

pub use error::ErrorResponse;
pub use router::app_router;
pub use state::{AppState, BillingUrls};
