//! Idempotent webhook processing.
//!
//! Sits between an authenticated [`PaymentEvent`] and the handlers that
//! change listing state, making sure each event id is applied at most once.
//!
//! ## Steps
//!
//! 1. Claim the event id by inserting a `processing` record
//! 2. Dispatch to the handler for the event kind, only if the claim was won
//! 3. Complete the claim with the outcome (success, ignored, or non-retryable
//!    failure), or release it when the failure is retryable
//!
//! A delivery that finds a finished record reports `AlreadyProcessed`. One
//! that finds a live claim gets `InProgress`, which asks for redelivery. A
//! claim older than the lease is treated as abandoned by a crashed instance
//! and taken over.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::errors::WebhookError;
use super::event::{PaymentEvent, PaymentEventKind};
use crate::ports::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome, WebhookResult,
};

/// How long a `processing` claim is honoured before it counts as abandoned.
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 300;

/// Handler for one or more webhook event kinds.
#[async_trait]
pub trait WebhookEventHandler: Send + Sync {
    fn handles(&self) -> Vec<PaymentEventKind>;

    /// Applies the event.
    ///
    /// `Err(WebhookError::Ignored(_))` acknowledges the event without acting.
    async fn handle(&self, event: &PaymentEvent) -> Result<(), WebhookError>;
}

/// Routes events to their handler.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    fn get_handler(&self, kind: PaymentEventKind) -> Option<&dyn WebhookEventHandler>;

    /// Dispatches an event. Kinds with no handler are `Ignored`.
    async fn dispatch(&self, event: &PaymentEvent) -> Result<(), WebhookError> {
        let kind = event.kind();
        match self.get_handler(kind) {
            Some(handler) => handler.handle(event).await,
            None => Err(WebhookError::Ignored(format!(
                "no handler for {}",
                event.event_type
            ))),
        }
    }
}

/// Result of trying to claim an event id.
enum Claim {
    Acquired,
    Finished,
    InFlight,
}

/// Processes webhook events with idempotency guarantees.
pub struct IdempotentWebhookProcessor {
    repository: Arc<dyn WebhookEventRepository>,
    dispatcher: Arc<dyn WebhookDispatcher>,
    claim_lease: Duration,
}

impl IdempotentWebhookProcessor {
    pub fn new(
        repository: Arc<dyn WebhookEventRepository>,
        dispatcher: Arc<dyn WebhookDispatcher>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            claim_lease: Duration::seconds(DEFAULT_CLAIM_LEASE_SECS),
        }
    }

    /// Overrides how long an unfinished claim blocks other deliveries.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    /// Processes an event at most once per event id.
    ///
    /// # Returns
    ///
    /// - `Ok(Processed)` - handled now (including ignored events)
    /// - `Ok(AlreadyProcessed)` - finished earlier, nothing dispatched
    /// - `Err(InProgress)` - another delivery holds the claim, nothing dispatched
    /// - `Err(_)` - handler or store failure
    pub async fn process(&self, event: PaymentEvent) -> Result<WebhookResult, WebhookError> {
        let Some(event_id) = event.id.clone() else {
            tracing::warn!(
                event_type = %event.event_type,
                "Webhook event has no id, processing without idempotency record"
            );
            return match self.dispatcher.dispatch(&event).await {
                Ok(()) | Err(WebhookError::Ignored(_)) => Ok(WebhookResult::Processed),
                Err(e) => Err(e),
            };
        };

        let payload = serde_json::to_value(&event)
            .map_err(|e| WebhookError::InvalidPayload(format!("failed to serialize event: {}", e)))?;

        let claim = WebhookEventRecord::processing(&event_id, &event.event_type, payload.clone());
        let claimed_at = claim.processed_at;

        match self.claim(claim).await? {
            Claim::Acquired => {}
            Claim::Finished => {
                tracing::info!(event_id = %event_id, "Duplicate webhook event skipped");
                return Ok(WebhookResult::AlreadyProcessed);
            }
            Claim::InFlight => {
                tracing::info!(event_id = %event_id, "Webhook event is being handled by another delivery");
                return Err(WebhookError::InProgress(event_id));
            }
        }

        let result = self.dispatcher.dispatch(&event).await;

        if let Err(e) = &result {
            if e.is_retryable() {
                tracing::warn!(
                    event_id = %event_id,
                    reason = e.reason(),
                    error = %e,
                    "Webhook handling failed, releasing claim for redelivery"
                );
                if let Err(release_err) = self.repository.release(&event_id, claimed_at).await {
                    tracing::error!(
                        event_id = %event_id,
                        error = %release_err,
                        "Failed to release webhook claim; redelivery waits for the lease"
                    );
                }
                return Err(e.clone());
            }
        }

        let record = match &result {
            Ok(()) => WebhookEventRecord::success(&event_id, &event.event_type, payload),
            Err(WebhookError::Ignored(reason)) => {
                WebhookEventRecord::ignored(&event_id, &event.event_type, reason, payload)
            }
            Err(e) => {
                WebhookEventRecord::failed(&event_id, &event.event_type, e.to_string(), payload)
            }
        };

        // The handler's effects are applied; a bookkeeping failure must not
        // turn into a redelivery that applies them again.
        match self.repository.complete(claimed_at, record).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                event_id = %event_id,
                "Webhook claim was taken over before completion"
            ),
            Err(e) => tracing::error!(
                event_id = %event_id,
                error = %e,
                "Failed to record webhook outcome"
            ),
        }

        match result {
            Ok(()) | Err(WebhookError::Ignored(_)) => Ok(WebhookResult::Processed),
            Err(e) => Err(e),
        }
    }

    async fn claim(&self, record: WebhookEventRecord) -> Result<Claim, WebhookError> {
        if self.repository.save(record.clone()).await? == SaveResult::Inserted {
            return Ok(Claim::Acquired);
        }

        let event_id = record.event_id.clone();
        match self.repository.find_by_event_id(&event_id).await? {
            Some(existing) if existing.outcome != WebhookOutcome::Processing => Ok(Claim::Finished),
            Some(existing) => {
                if Utc::now() - existing.processed_at < self.claim_lease {
                    return Ok(Claim::InFlight);
                }
                tracing::warn!(
                    event_id = %event_id,
                    claimed_at = %existing.processed_at,
                    "Taking over abandoned webhook claim"
                );
                self.repository
                    .release(&event_id, existing.processed_at)
                    .await?;
                self.retry_claim(record).await
            }
            // Released by a failed delivery between our insert and lookup.
            None => self.retry_claim(record).await,
        }
    }

    async fn retry_claim(&self, record: WebhookEventRecord) -> Result<Claim, WebhookError> {
        Ok(match self.repository.save(record).await? {
            SaveResult::Inserted => Claim::Acquired,
            SaveResult::AlreadyExists => Claim::InFlight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::event::PaymentEventBuilder;
    use crate::ports::StoreError;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::RwLock;

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct MockWebhookRepository {
        records: RwLock<HashMap<String, WebhookEventRecord>>,
    }

    impl MockWebhookRepository {
        async fn outcome(&self, event_id: &str) -> Option<WebhookOutcome> {
            self.records.read().await.get(event_id).map(|r| r.outcome)
        }
    }

    #[async_trait]
    impl WebhookEventRepository for MockWebhookRepository {
        async fn find_by_event_id(
            &self,
            event_id: &str,
        ) -> Result<Option<WebhookEventRecord>, StoreError> {
            Ok(self.records.read().await.get(event_id).cloned())
        }

        async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, StoreError> {
            let mut records = self.records.write().await;
            if records.contains_key(&record.event_id) {
                Ok(SaveResult::AlreadyExists)
            } else {
                records.insert(record.event_id.clone(), record);
                Ok(SaveResult::Inserted)
            }
        }

        async fn complete(
            &self,
            claimed_at: DateTime<Utc>,
            record: WebhookEventRecord,
        ) -> Result<bool, StoreError> {
            let mut records = self.records.write().await;
            match records.get_mut(&record.event_id) {
                Some(current) if is_claim(current, claimed_at) => {
                    *current = record;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn release(
            &self,
            event_id: &str,
            claimed_at: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            let mut records = self.records.write().await;
            let held = records
                .get(event_id)
                .is_some_and(|current| is_claim(current, claimed_at));
            if held {
                records.remove(event_id);
            }
            Ok(held)
        }

        async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, StoreError> {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|_, r| r.processed_at >= timestamp);
            Ok((before - records.len()) as u64)
        }
    }

    fn is_claim(record: &WebhookEventRecord, claimed_at: DateTime<Utc>) -> bool {
        record.outcome == WebhookOutcome::Processing && record.processed_at == claimed_at
    }

    enum Behaviour {
        Succeed,
        SucceedSlowly,
        Ignore,
        FailPermanently,
        FailRetryably,
    }

    struct MockHandler {
        kinds: Vec<PaymentEventKind>,
        behaviour: Behaviour,
        call_count: AtomicU32,
    }

    impl MockHandler {
        fn new(kinds: Vec<PaymentEventKind>, behaviour: Behaviour) -> Self {
            Self {
                kinds,
                behaviour,
                call_count: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookEventHandler for MockHandler {
        fn handles(&self) -> Vec<PaymentEventKind> {
            self.kinds.clone()
        }

        async fn handle(&self, _event: &PaymentEvent) -> Result<(), WebhookError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::SucceedSlowly => {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    Ok(())
                }
                Behaviour::Ignore => Err(WebhookError::Ignored("test ignore".to_string())),
                Behaviour::FailPermanently => Err(WebhookError::MissingField("customer")),
                Behaviour::FailRetryably => Err(WebhookError::Store("timeout".to_string())),
            }
        }
    }

    struct SingleHandlerDispatcher {
        handler: Arc<MockHandler>,
    }

    #[async_trait]
    impl WebhookDispatcher for SingleHandlerDispatcher {
        fn get_handler(&self, kind: PaymentEventKind) -> Option<&dyn WebhookEventHandler> {
            if self.handler.kinds.contains(&kind) {
                Some(self.handler.as_ref())
            } else {
                None
            }
        }
    }

    fn setup(
        behaviour: Behaviour,
    ) -> (
        IdempotentWebhookProcessor,
        Arc<MockWebhookRepository>,
        Arc<MockHandler>,
    ) {
        let repo = Arc::new(MockWebhookRepository::default());
        let handler = Arc::new(MockHandler::new(
            vec![
                PaymentEventKind::CheckoutSessionCompleted,
                PaymentEventKind::InvoicePaid,
            ],
            behaviour,
        ));
        let dispatcher = Arc::new(SingleHandlerDispatcher {
            handler: handler.clone(),
        });
        (
            IdempotentWebhookProcessor::new(repo.clone(), dispatcher),
            repo,
            handler,
        )
    }

    fn test_event(id: &str, event_type: &str) -> PaymentEvent {
        PaymentEventBuilder::new().id(id).event_type(event_type).build()
    }

    // ══════════════════════════════════════════════════════════════
    // Dispatcher Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn dispatcher_ignores_unregistered_kinds() {
        let handler = Arc::new(MockHandler::new(
            vec![PaymentEventKind::CheckoutSessionCompleted],
            Behaviour::Succeed,
        ));
        let dispatcher = SingleHandlerDispatcher { handler };

        let result = dispatcher
            .dispatch(&test_event("evt_unknown", "charge.refunded"))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Processor Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn processes_new_event_and_records_success() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);

        let result = processor
            .process(test_event("evt_new", "checkout.session.completed"))
            .await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(handler.call_count(), 1);
        assert_eq!(repo.outcome("evt_new").await, Some(WebhookOutcome::Success));
    }

    #[tokio::test]
    async fn duplicate_delivery_dispatches_once() {
        let (processor, _repo, handler) = setup(Behaviour::Succeed);

        processor
            .process(test_event("evt_dup", "checkout.session.completed"))
            .await
            .unwrap();
        let second = processor
            .process(test_event("evt_dup", "checkout.session.completed"))
            .await;

        assert_eq!(second.unwrap(), WebhookResult::AlreadyProcessed);
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn ignored_events_are_recorded_and_processed() {
        let (processor, repo, _handler) = setup(Behaviour::Ignore);

        let result = processor
            .process(test_event("evt_ignore", "invoice.paid"))
            .await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(repo.outcome("evt_ignore").await, Some(WebhookOutcome::Ignored));
    }

    #[tokio::test]
    async fn unhandled_kind_is_recorded_as_ignored() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);

        let result = processor
            .process(test_event("evt_other", "customer.created"))
            .await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(handler.call_count(), 0);
        assert_eq!(repo.outcome("evt_other").await, Some(WebhookOutcome::Ignored));
    }

    #[tokio::test]
    async fn permanent_failure_is_recorded_and_returned() {
        let (processor, repo, handler) = setup(Behaviour::FailPermanently);

        let first = processor
            .process(test_event("evt_bad", "checkout.session.completed"))
            .await;
        let second = processor
            .process(test_event("evt_bad", "checkout.session.completed"))
            .await;

        assert_eq!(first.unwrap_err(), WebhookError::MissingField("customer"));
        assert_eq!(second.unwrap(), WebhookResult::AlreadyProcessed);
        assert_eq!(handler.call_count(), 1);
        assert_eq!(repo.outcome("evt_bad").await, Some(WebhookOutcome::Failed));
    }

    #[tokio::test]
    async fn retryable_failure_is_not_recorded() {
        let (processor, repo, handler) = setup(Behaviour::FailRetryably);

        let first = processor
            .process(test_event("evt_retry", "checkout.session.completed"))
            .await;
        let second = processor
            .process(test_event("evt_retry", "checkout.session.completed"))
            .await;

        assert!(first.unwrap_err().is_retryable());
        assert!(second.is_err());
        assert_eq!(handler.call_count(), 2);
        assert_eq!(repo.outcome("evt_retry").await, None);
    }

    #[tokio::test]
    async fn event_without_id_is_dispatched_every_time() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        let event = PaymentEventBuilder::new().without_id().build();

        processor.process(event.clone()).await.unwrap();
        processor.process(event).await.unwrap();

        assert_eq!(handler.call_count(), 2);
        assert!(repo.records.read().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_deliveries_dispatch_once() {
        let (processor, repo, handler) = setup(Behaviour::SucceedSlowly);

        let (first, second) = tokio::join!(
            processor.process(test_event("evt_dup", "checkout.session.completed")),
            processor.process(test_event("evt_dup", "checkout.session.completed")),
        );

        assert_eq!(handler.call_count(), 1);
        let processed = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Ok(WebhookResult::Processed)))
            .count();
        let in_flight = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(WebhookError::InProgress(_))))
            .count();
        assert_eq!((processed, in_flight), (1, 1));
        assert_eq!(repo.outcome("evt_dup").await, Some(WebhookOutcome::Success));
    }

    #[tokio::test]
    async fn live_claim_asks_for_redelivery_without_dispatch() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        repo.save(WebhookEventRecord::processing(
            "evt_busy",
            "checkout.session.completed",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let result = processor
            .process(test_event("evt_busy", "checkout.session.completed"))
            .await;

        assert_eq!(
            result.unwrap_err(),
            WebhookError::InProgress("evt_busy".to_string())
        );
        assert_eq!(handler.call_count(), 0);
        assert_eq!(repo.outcome("evt_busy").await, Some(WebhookOutcome::Processing));
    }

    #[tokio::test]
    async fn abandoned_claim_is_taken_over() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        let mut abandoned = WebhookEventRecord::processing(
            "evt_orphan",
            "checkout.session.completed",
            serde_json::json!({}),
        );
        abandoned.processed_at = Utc::now() - Duration::seconds(DEFAULT_CLAIM_LEASE_SECS + 60);
        repo.save(abandoned).await.unwrap();

        let result = processor
            .process(test_event("evt_orphan", "checkout.session.completed"))
            .await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(handler.call_count(), 1);
        assert_eq!(repo.outcome("evt_orphan").await, Some(WebhookOutcome::Success));
    }

    #[tokio::test]
    async fn claim_lease_is_configurable() {
        let (processor, repo, handler) = setup(Behaviour::Succeed);
        let processor = processor.with_claim_lease(Duration::zero());
        repo.save(WebhookEventRecord::processing(
            "evt_fresh",
            "invoice.paid",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let result = processor.process(test_event("evt_fresh", "invoice.paid")).await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn different_events_processed_independently() {
        let (processor, _repo, handler) = setup(Behaviour::Succeed);

        let r1 = processor
            .process(test_event("evt_1", "checkout.session.completed"))
            .await;
        let r2 = processor.process(test_event("evt_2", "invoice.paid")).await;

        assert_eq!(r1.unwrap(), WebhookResult::Processed);
        assert_eq!(r2.unwrap(), WebhookResult::Processed);
        assert_eq!(handler.call_count(), 2);
    }
}
