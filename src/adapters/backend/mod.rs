//! Hosted backend adapters.
//!
//! - `InMemoryBackend` - development and tests
//! - `RestBackendClient` - REST gateway of the hosted backend

mod memory;
mod rest;

pub use memory::{InMemoryBackend, DEFAULT_MAX_OBJECT_BYTES};
pub use rest::RestBackendClient;
