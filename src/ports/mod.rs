//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Hosted Backend Ports
//!
//! - `BackendStore` - Table rows (listings, webhook records)
//! - `BackendAuth` - Session token lookup
//! - `FileStorage` - Bucketed object storage
//! - `Realtime` - Row change notifications
//!
//! ## Billing Ports
//!
//! - `PaymentProvider` - Hosted checkout and customer portal sessions
//! - `WebhookEventRepository` - Payment webhook idempotency tracking
//!
//! ## Messaging Ports
//!
//! - `EmailSender` - Transactional email

mod backend_auth;
mod backend_store;
mod email_sender;
mod file_storage;
mod payment_provider;
mod realtime;
mod webhook_event_repository;

pub use backend_auth::{AuthError, BackendAuth, Identity, SessionToken};
pub use backend_store::{BackendStore, Condition, Filter, FilterOp, Row, StoreError};
pub use email_sender::{EmailError, EmailMessage, EmailSender};
pub use file_storage::{validate_object_path, FileStorage, StorageError};
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession,
};
pub use realtime::{ChangeCallback, ChangeEvent, ChangeKind, Realtime, SubscriptionHandle};
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome, WebhookResult,
};
