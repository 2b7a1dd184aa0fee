//! WebhookEventRepository port - tracks which payment webhooks were handled.
//!
//! The processor retries deliveries that did not get a 2xx response, and can
//! deliver the same event more than once even when they did. Each event id is
//! claimed with a `processing` record before its handler runs, and the claim
//! is then completed with the outcome or released for redelivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ports::backend_store::StoreError;

/// How a recorded event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Claimed by a delivery whose handler has not finished.
    Processing,
    Success,
    Ignored,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "success" => Some(Self::Success),
            "ignored" => Some(Self::Ignored),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Record of a claimed or handled webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    /// Claim time while `Processing`, completion time afterwards.
    pub processed_at: DateTime<Utc>,
    pub outcome: WebhookOutcome,

    /// Ignore reason or failure message.
    pub detail: Option<String>,

    /// Verified event payload, kept for auditing.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    fn with_outcome(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        outcome: WebhookOutcome,
        detail: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome,
            detail,
            payload,
        }
    }

    pub fn processing(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(event_id, event_type, WebhookOutcome::Processing, None, payload)
    }

    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(event_id, event_type, WebhookOutcome::Success, None, payload)
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(
            event_id,
            event_type,
            WebhookOutcome::Ignored,
            Some(reason.into()),
            payload,
        )
    }

    pub fn failed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_outcome(
            event_id,
            event_type,
            WebhookOutcome::Failed,
            Some(error.into()),
            payload,
        )
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First record for this event id.
    Inserted,
    /// Another delivery recorded the event first.
    AlreadyExists,
}

/// Storage for claimed and handled webhook events.
///
/// `save` must be insert-if-absent and atomic per event id; it is the only
/// guard against two concurrent deliveries both applying an event.
///
/// `complete` and `release` act only on a `Processing` record whose
/// `processed_at` equals `claimed_at`, so a delivery can never overwrite or
/// drop a claim that another delivery has since taken over.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(&self, event_id: &str)
        -> Result<Option<WebhookEventRecord>, StoreError>;

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, StoreError>;

    /// Replaces the claim with its final record. Returns false when the claim
    /// is no longer held.
    async fn complete(
        &self,
        claimed_at: DateTime<Utc>,
        record: WebhookEventRecord,
    ) -> Result<bool, StoreError>;

    /// Deletes the claim so a later delivery can try again. Returns false when
    /// the claim is no longer held.
    async fn release(&self, event_id: &str, claimed_at: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Deletes records processed before `timestamp`. Returns the count removed.
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    Processed,
    AlreadyProcessed,
}
