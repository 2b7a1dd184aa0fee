//! Webhook event repositories.

mod in_memory_event_repository;
mod store_event_repository;

pub use in_memory_event_repository::InMemoryWebhookEventRepository;
pub use store_event_repository::{StoreWebhookEventRepository, WEBHOOK_EVENTS_TABLE};
