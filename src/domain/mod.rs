//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared value objects (IDs, timestamps, validation errors)
//! - `listing` - Featured listing billing state and transitions
//! - `webhook` - Payment webhook authentication and idempotent processing

pub mod foundation;
pub mod listing;
pub mod webhook;
