//! In-memory webhook event repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ports::{
    SaveResult, StoreError, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};

/// Webhook event records held in memory. Used in development and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    records: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, StoreError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(record.event_id.clone(), record);
        Ok(SaveResult::Inserted)
    }

    async fn complete(
        &self,
        claimed_at: DateTime<Utc>,
        record: WebhookEventRecord,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.event_id) {
            Some(current) if holds_claim(current, claimed_at) => {
                *current = record;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, event_id: &str, claimed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get(event_id) {
            Some(current) if holds_claim(current, claimed_at) => {
                records.remove(event_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.processed_at >= timestamp);
        Ok((before - records.len()) as u64)
    }
}

fn holds_claim(record: &WebhookEventRecord, claimed_at: DateTime<Utc>) -> bool {
    record.outcome == WebhookOutcome::Processing && record.processed_at == claimed_at
}
