//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, time values and validation errors that form the
//! vocabulary of the directory domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ListingId, UserId};
pub use timestamp::Timestamp;
