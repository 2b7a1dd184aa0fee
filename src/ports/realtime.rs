//! Realtime port - row change notifications from the hosted backend.
//!
//! The dashboard listens for changes to a practitioner's listing so the
//! featured badge flips as soon as a webhook lands.

use std::sync::Arc;

use crate::ports::backend_store::{Filter, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A row change pushed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub row: Row,
}

/// Callback invoked for every matching change.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

pub trait Realtime: Send + Sync {
    /// Registers `on_change` for changes to rows of `table` matching `filter`.
    fn subscribe(&self, table: &str, filter: Filter, on_change: ChangeCallback)
        -> SubscriptionHandle;

    /// Removes a subscription. Returns false when the handle is unknown.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool;
}
