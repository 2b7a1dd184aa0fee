//! Webhook event repository on the backend store.
//!
//! Records live in the `webhook_events` table keyed by event id, so the
//! table's primary key makes `save` insert-if-absent across instances.
//! Completing or releasing a claim is a filtered update or delete that only
//! matches the `processing` row written at the claim time.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::ports::{
    BackendStore, Filter, Row, SaveResult, StoreError, WebhookEventRecord,
    WebhookEventRepository, WebhookOutcome,
};

pub const WEBHOOK_EVENTS_TABLE: &str = "webhook_events";

pub struct StoreWebhookEventRepository {
    store: Arc<dyn BackendStore>,
}

impl StoreWebhookEventRepository {
    pub fn new(store: Arc<dyn BackendStore>) -> Self {
        Self { store }
    }
}

/// Fixed-width UTC timestamps, so `lt` compares correctly as text.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Matches the claim row for `event_id` taken at `claimed_at`.
fn claim_filter(event_id: &str, claimed_at: DateTime<Utc>) -> Filter {
    Filter::new()
        .eq("id", event_id)
        .eq("outcome", WebhookOutcome::Processing.as_str())
        .eq("processed_at", format_timestamp(claimed_at))
}

fn to_row(record: &WebhookEventRecord) -> Row {
    let value = json!({
        "id": record.event_id,
        "event_type": record.event_type,
        "processed_at": format_timestamp(record.processed_at),
        "outcome": record.outcome.as_str(),
        "detail": record.detail,
        "payload": record.payload,
    });
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

fn from_row(row: &Row) -> Result<WebhookEventRecord, StoreError> {
    let text = |column: &str| {
        row.get(column)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode(format!("webhook_events.{column} missing")))
    };

    let processed_at = DateTime::parse_from_rfc3339(text("processed_at")?)
        .map_err(|e| StoreError::Decode(format!("webhook_events.processed_at: {e}")))?
        .with_timezone(&Utc);
    let outcome = WebhookOutcome::parse(text("outcome")?)
        .ok_or_else(|| StoreError::Decode("webhook_events.outcome unknown".to_string()))?;

    Ok(WebhookEventRecord {
        event_id: text("id")?.to_string(),
        event_type: text("event_type")?.to_string(),
        processed_at,
        outcome,
        detail: row.get("detail").and_then(Value::as_str).map(str::to_string),
        payload: row.get("payload").cloned().unwrap_or(Value::Null),
    })
}

#[async_trait]
impl WebhookEventRepository for StoreWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, StoreError> {
        self.store
            .select_one(WEBHOOK_EVENTS_TABLE, &Filter::new().eq("id", event_id))
            .await?
            .as_ref()
            .map(from_row)
            .transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, StoreError> {
        match self.store.insert(WEBHOOK_EVENTS_TABLE, to_row(&record)).await {
            Ok(_) => Ok(SaveResult::Inserted),
            Err(StoreError::Conflict(_)) => Ok(SaveResult::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    async fn complete(
        &self,
        claimed_at: DateTime<Utc>,
        record: WebhookEventRecord,
    ) -> Result<bool, StoreError> {
        let updated = self
            .store
            .update(
                WEBHOOK_EVENTS_TABLE,
                &claim_filter(&record.event_id, claimed_at),
                to_row(&record),
            )
            .await?;
        Ok(!updated.is_empty())
    }

    async fn release(&self, event_id: &str, claimed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let removed = self
            .store
            .delete(WEBHOOK_EVENTS_TABLE, &claim_filter(event_id, claimed_at))
            .await?;
        Ok(removed > 0)
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store
            .delete(
                WEBHOOK_EVENTS_TABLE,
                &Filter::new().lt("processed_at", format_timestamp(timestamp)),
            )
            .await
    }
}
