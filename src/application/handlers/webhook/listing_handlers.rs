//! Webhook handlers that keep featured listings in sync with billing.
//!
//! Each handler reads only what it needs from `data.object` and writes the
//! listing's billing columns. Handlers are safe to run twice for the same
//! event; the processor's idempotency record is the primary guard, this is
//! the second.

use async_trait::async_trait;

use crate::application::listings::ListingStore;
use crate::application::notifications::BillingNotifier;
use crate::domain::foundation::{ListingId, Timestamp};
use crate::domain::listing::{FeaturedListing, SubscriptionStatus};
use crate::domain::webhook::{
    PaymentEvent, PaymentEventKind, WebhookDispatcher, WebhookError, WebhookEventHandler,
};

// ════════════════════════════════════════════════════════════════════════════
// Dispatcher
// ════════════════════════════════════════════════════════════════════════════

/// Routes billing events to the listing handlers.
pub struct ListingWebhookDispatcher {
    checkout: CheckoutCompletedHandler,
    subscription_sync: SubscriptionSyncHandler,
    subscription_deleted: SubscriptionDeletedHandler,
    invoice_paid: InvoicePaidHandler,
    invoice_failed: InvoicePaymentFailedHandler,
}

impl ListingWebhookDispatcher {
    pub fn new(listings: ListingStore, notifier: BillingNotifier) -> Self {
        Self {
            checkout: CheckoutCompletedHandler {
                listings: listings.clone(),
                notifier: notifier.clone(),
            },
            subscription_sync: SubscriptionSyncHandler {
                listings: listings.clone(),
            },
            subscription_deleted: SubscriptionDeletedHandler {
                listings: listings.clone(),
            },
            invoice_paid: InvoicePaidHandler {
                listings: listings.clone(),
            },
            invoice_failed: InvoicePaymentFailedHandler { listings, notifier },
        }
    }
}

#[async_trait]
impl WebhookDispatcher for ListingWebhookDispatcher {
    fn get_handler(&self, kind: PaymentEventKind) -> Option<&dyn WebhookEventHandler> {
        match kind {
            PaymentEventKind::CheckoutSessionCompleted => Some(&self.checkout),
            PaymentEventKind::SubscriptionCreated | PaymentEventKind::SubscriptionUpdated => {
                Some(&self.subscription_sync)
            }
            PaymentEventKind::SubscriptionDeleted => Some(&self.subscription_deleted),
            PaymentEventKind::InvoicePaid | PaymentEventKind::InvoicePaymentSucceeded => {
                Some(&self.invoice_paid)
            }
            PaymentEventKind::InvoicePaymentFailed => Some(&self.invoice_failed),
            PaymentEventKind::Unknown => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════

/// `checkout.session.completed`: the practitioner paid for the featured tier.
pub struct CheckoutCompletedHandler {
    listings: ListingStore,
    notifier: BillingNotifier,
}

#[async_trait]
impl WebhookEventHandler for CheckoutCompletedHandler {
    fn handles(&self) -> Vec<PaymentEventKind> {
        vec![PaymentEventKind::CheckoutSessionCompleted]
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<(), WebhookError> {
        if event.object_str("payment_status") == Some("unpaid") {
            return Err(WebhookError::Ignored(
                "checkout completed with payment pending".to_string(),
            ));
        }

        let reference = event
            .object_str("client_reference_id")
            .or_else(|| event.object_str("metadata.listing_id"))
            .ok_or(WebhookError::MissingField("client_reference_id"))?;
        let listing_id = parse_listing_id(reference)?;
        let customer_id = event.require_str("customer")?;
        let subscription_id = event
            .object_str("subscription")
            .or_else(|| event.object_str("subscription.id"))
            .map(String::from);

        let mut listing = self
            .listings
            .find_by_id(&listing_id)
            .await?
            .ok_or_else(|| WebhookError::ListingNotFound(reference.to_string()))?;

        listing.activate(customer_id, subscription_id, None);
        save(&self.listings, &listing).await?;

        tracing::info!(
            event_id = event.log_id(),
            listing_id = %listing.id,
            "Featured listing activated"
        );

        self.notifier.featured_activated(&listing).await;
        Ok(())
    }
}

/// `customer.subscription.created` / `updated`: mirror the processor's status.
pub struct SubscriptionSyncHandler {
    listings: ListingStore,
}

#[async_trait]
impl WebhookEventHandler for SubscriptionSyncHandler {
    fn handles(&self) -> Vec<PaymentEventKind> {
        vec![
            PaymentEventKind::SubscriptionCreated,
            PaymentEventKind::SubscriptionUpdated,
        ]
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<(), WebhookError> {
        let subscription_id = event.require_str("id")?;
        let raw_status = event.require_str("status")?;
        let status = SubscriptionStatus::parse(raw_status).ok_or_else(|| {
            WebhookError::Ignored(format!("unrecognised subscription status {}", raw_status))
        })?;
        let period_end = event
            .object_i64("current_period_end")
            .or_else(|| event.object_i64("items.data.0.current_period_end"))
            .and_then(Timestamp::from_unix_secs);

        let mut listing = locate(
            &self.listings,
            subscription_id,
            event.object_str("metadata.listing_id"),
        )
        .await?
        .ok_or_else(|| WebhookError::Ignored("subscription is not linked to a listing".into()))?;

        listing.apply_subscription(subscription_id, status, period_end);
        save(&self.listings, &listing).await?;

        tracing::info!(
            event_id = event.log_id(),
            listing_id = %listing.id,
            status = %status,
            featured = listing.is_featured,
            "Listing subscription synced"
        );
        Ok(())
    }
}

/// `customer.subscription.deleted`: featured placement ends.
pub struct SubscriptionDeletedHandler {
    listings: ListingStore,
}

#[async_trait]
impl WebhookEventHandler for SubscriptionDeletedHandler {
    fn handles(&self) -> Vec<PaymentEventKind> {
        vec![PaymentEventKind::SubscriptionDeleted]
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<(), WebhookError> {
        let subscription_id = event.require_str("id")?;

        let mut listing = locate(
            &self.listings,
            subscription_id,
            event.object_str("metadata.listing_id"),
        )
        .await?
        .ok_or_else(|| WebhookError::Ignored("subscription is not linked to a listing".into()))?;

        if listing
            .stripe_subscription_id
            .as_deref()
            .is_some_and(|current| current != subscription_id)
        {
            return Err(WebhookError::Ignored(
                "deleted subscription was superseded".to_string(),
            ));
        }

        listing.end_subscription();
        save(&self.listings, &listing).await?;

        tracing::info!(
            event_id = event.log_id(),
            listing_id = %listing.id,
            "Featured subscription ended"
        );
        Ok(())
    }
}

/// `invoice.paid` / `invoice.payment_succeeded`: renewal collected.
pub struct InvoicePaidHandler {
    listings: ListingStore,
}

#[async_trait]
impl WebhookEventHandler for InvoicePaidHandler {
    fn handles(&self) -> Vec<PaymentEventKind> {
        vec![
            PaymentEventKind::InvoicePaid,
            PaymentEventKind::InvoicePaymentSucceeded,
        ]
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<(), WebhookError> {
        let mut listing = locate_for_invoice(&self.listings, event).await?;
        let period_end = event
            .object_i64("lines.data.0.period.end")
            .and_then(Timestamp::from_unix_secs);

        listing.record_payment(period_end);
        save(&self.listings, &listing).await?;

        tracing::info!(
            event_id = event.log_id(),
            listing_id = %listing.id,
            "Featured listing payment recorded"
        );
        Ok(())
    }
}

/// `invoice.payment_failed`: renewal failed, grace period starts.
pub struct InvoicePaymentFailedHandler {
    listings: ListingStore,
    notifier: BillingNotifier,
}

#[async_trait]
impl WebhookEventHandler for InvoicePaymentFailedHandler {
    fn handles(&self) -> Vec<PaymentEventKind> {
        vec![PaymentEventKind::InvoicePaymentFailed]
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<(), WebhookError> {
        let mut listing = locate_for_invoice(&self.listings, event).await?;

        listing
            .mark_past_due()
            .map_err(|e| WebhookError::Ignored(e.to_string()))?;
        save(&self.listings, &listing).await?;

        tracing::warn!(
            event_id = event.log_id(),
            listing_id = %listing.id,
            attempt = event.object_i64("attempt_count"),
            "Featured listing payment failed"
        );

        self.notifier.payment_failed(&listing).await;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════════

fn parse_listing_id(reference: &str) -> Result<ListingId, WebhookError> {
    reference
        .parse()
        .map_err(|_| WebhookError::InvalidPayload(format!("invalid listing reference {}", reference)))
}

/// Finds the listing for a subscription, by subscription id first and then
/// by the listing id carried in metadata.
///
/// `Ok(None)` means the event carries no usable reference at all.
async fn locate(
    listings: &ListingStore,
    subscription_id: &str,
    listing_ref: Option<&str>,
) -> Result<Option<FeaturedListing>, WebhookError> {
    if let Some(listing) = listings.find_by_subscription_id(subscription_id).await? {
        return Ok(Some(listing));
    }

    let Some(reference) = listing_ref else {
        return Ok(None);
    };
    let listing_id = parse_listing_id(reference)?;
    listings
        .find_by_id(&listing_id)
        .await?
        .map(Some)
        .ok_or_else(|| WebhookError::ListingNotFound(reference.to_string()))
}

async fn locate_for_invoice(
    listings: &ListingStore,
    event: &PaymentEvent,
) -> Result<FeaturedListing, WebhookError> {
    let subscription_id = event
        .object_str("subscription")
        .or_else(|| event.object_str("subscription.id"))
        .or_else(|| event.object_str("parent.subscription_details.subscription"))
        .ok_or_else(|| WebhookError::Ignored("invoice has no subscription".to_string()))?;
    let listing_ref = event
        .object_str("subscription_details.metadata.listing_id")
        .or_else(|| event.object_str("parent.subscription_details.metadata.listing_id"));

    // The invoice can arrive before the checkout event links the subscription;
    // a retryable error lets the processor deliver it again later.
    locate(listings, subscription_id, listing_ref)
        .await?
        .ok_or_else(|| WebhookError::ListingNotFound(subscription_id.to_string()))
}

async fn save(listings: &ListingStore, listing: &FeaturedListing) -> Result<(), WebhookError> {
    if listings.save_billing(listing).await? {
        Ok(())
    } else {
        Err(WebhookError::ListingNotFound(listing.id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::backend::InMemoryBackend;
    use crate::domain::foundation::UserId;
    use crate::domain::webhook::PaymentEventBuilder;
    use crate::ports::{EmailError, EmailMessage, EmailSender};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    // ════════════════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ════════════════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
            if self.fail {
                return Err(EmailError::Network("down".to_string()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: ListingWebhookDispatcher,
        listings: ListingStore,
        sender: Arc<RecordingSender>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_sender(RecordingSender::default())
        }

        fn with_sender(sender: RecordingSender) -> Self {
            let listings = ListingStore::new(Arc::new(InMemoryBackend::new()));
            let sender = Arc::new(sender);
            let notifier = BillingNotifier::new(sender.clone(), "https://dir.example/dashboard");
            Self {
                dispatcher: ListingWebhookDispatcher::new(listings.clone(), notifier),
                listings,
                sender,
            }
        }

        async fn seed(&self, configure: impl FnOnce(&mut FeaturedListing)) -> FeaturedListing {
            let mut listing = FeaturedListing::new(
                ListingId::new(),
                UserId::new("user-1").unwrap(),
                "Dr. Rivera",
                Some("rivera@example.com".to_string()),
            );
            configure(&mut listing);
            self.listings.insert(&listing).await.unwrap();
            listing
        }

        async fn reload(&self, listing: &FeaturedListing) -> FeaturedListing {
            self.listings.find_by_id(&listing.id).await.unwrap().unwrap()
        }

        fn emails(&self) -> usize {
            self.sender.sent.lock().unwrap().len()
        }
    }

    fn event(event_type: &str, object: serde_json::Value) -> PaymentEvent {
        PaymentEventBuilder::new()
            .event_type(event_type)
            .object(object)
            .build()
    }

    fn subscribed(listing: &mut FeaturedListing) {
        listing.activate("cus_1", Some("sub_1".to_string()), None);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Routing
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn every_known_kind_has_a_handler() {
        let fixture = Fixture::new();
        for kind in [
            PaymentEventKind::CheckoutSessionCompleted,
            PaymentEventKind::SubscriptionCreated,
            PaymentEventKind::SubscriptionUpdated,
            PaymentEventKind::SubscriptionDeleted,
            PaymentEventKind::InvoicePaid,
            PaymentEventKind::InvoicePaymentSucceeded,
            PaymentEventKind::InvoicePaymentFailed,
        ] {
            let handler = fixture.dispatcher.get_handler(kind).unwrap();
            assert!(handler.handles().contains(&kind));
        }
        assert!(fixture
            .dispatcher
            .get_handler(PaymentEventKind::Unknown)
            .is_none());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Checkout
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn checkout_features_listing_and_sends_one_email() {
        let fixture = Fixture::new();
        let listing = fixture.seed(|_| {}).await;

        fixture
            .dispatcher
            .dispatch(&event(
                "checkout.session.completed",
                json!({
                    "client_reference_id": listing.id.to_string(),
                    "customer": "cus_new",
                    "subscription": "sub_new",
                    "payment_status": "paid"
                }),
            ))
            .await
            .unwrap();

        let stored = fixture.reload(&listing).await;
        assert!(stored.is_featured);
        assert_eq!(stored.subscription_status, SubscriptionStatus::Active);
        assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_new"));
        assert_eq!(stored.stripe_subscription_id.as_deref(), Some("sub_new"));
        assert_eq!(fixture.emails(), 1);
    }

    #[tokio::test]
    async fn checkout_falls_back_to_metadata_reference() {
        let fixture = Fixture::new();
        let listing = fixture.seed(|_| {}).await;

        fixture
            .dispatcher
            .dispatch(&event(
                "checkout.session.completed",
                json!({
                    "metadata": { "listing_id": listing.id.to_string() },
                    "customer": "cus_new"
                }),
            ))
            .await
            .unwrap();

        assert!(fixture.reload(&listing).await.is_featured);
    }

    #[tokio::test]
    async fn checkout_email_failure_does_not_fail_webhook() {
        let fixture = Fixture::with_sender(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let listing = fixture.seed(|_| {}).await;

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "checkout.session.completed",
                json!({ "client_reference_id": listing.id.to_string(), "customer": "cus_1" }),
            ))
            .await;

        assert!(result.is_ok());
        assert!(fixture.reload(&listing).await.is_featured);
    }

    #[tokio::test]
    async fn checkout_without_reference_is_missing_field() {
        let fixture = Fixture::new();

        let result = fixture
            .dispatcher
            .dispatch(&event("checkout.session.completed", json!({ "customer": "cus_1" })))
            .await;

        assert_eq!(
            result.unwrap_err(),
            WebhookError::MissingField("client_reference_id")
        );
    }

    #[tokio::test]
    async fn checkout_with_garbage_reference_is_invalid_payload() {
        let fixture = Fixture::new();

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "checkout.session.completed",
                json!({ "client_reference_id": "not-a-uuid", "customer": "cus_1" }),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn checkout_for_unknown_listing_is_retryable() {
        let fixture = Fixture::new();

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "checkout.session.completed",
                json!({ "client_reference_id": ListingId::new().to_string(), "customer": "cus_1" }),
            ))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, WebhookError::ListingNotFound(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn checkout_with_pending_payment_is_ignored() {
        let fixture = Fixture::new();
        let listing = fixture.seed(|_| {}).await;

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "checkout.session.completed",
                json!({
                    "client_reference_id": listing.id.to_string(),
                    "customer": "cus_1",
                    "payment_status": "unpaid"
                }),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(!fixture.reload(&listing).await.is_featured);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Subscriptions
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn subscription_update_syncs_status_and_period() {
        let fixture = Fixture::new();
        let listing = fixture.seed(subscribed).await;

        fixture
            .dispatcher
            .dispatch(&event(
                "customer.subscription.updated",
                json!({ "id": "sub_1", "status": "unpaid", "current_period_end": 1706745600 }),
            ))
            .await
            .unwrap();

        let stored = fixture.reload(&listing).await;
        assert_eq!(stored.subscription_status, SubscriptionStatus::Unpaid);
        assert!(!stored.is_featured);
        assert_eq!(
            stored.featured_until.map(|t| t.as_unix_secs()),
            Some(1706745600)
        );
    }

    #[tokio::test]
    async fn subscription_created_links_listing_through_metadata() {
        let fixture = Fixture::new();
        let listing = fixture.seed(|_| {}).await;

        fixture
            .dispatcher
            .dispatch(&event(
                "customer.subscription.created",
                json!({
                    "id": "sub_9",
                    "status": "trialing",
                    "metadata": { "listing_id": listing.id.to_string() },
                    "items": { "data": [ { "current_period_end": 1706745600 } ] }
                }),
            ))
            .await
            .unwrap();

        let stored = fixture.reload(&listing).await;
        assert_eq!(stored.stripe_subscription_id.as_deref(), Some("sub_9"));
        assert!(stored.is_featured);
        assert!(stored.featured_until.is_some());
    }

    #[tokio::test]
    async fn unlinked_subscription_is_ignored() {
        let fixture = Fixture::new();

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "customer.subscription.updated",
                json!({ "id": "sub_unknown", "status": "active" }),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
    }

    #[tokio::test]
    async fn unknown_subscription_status_is_ignored() {
        let fixture = Fixture::new();
        fixture.seed(subscribed).await;

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "customer.subscription.updated",
                json!({ "id": "sub_1", "status": "mystery" }),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
    }

    #[tokio::test]
    async fn subscription_deleted_unfeatures_listing() {
        let fixture = Fixture::new();
        let listing = fixture.seed(subscribed).await;

        fixture
            .dispatcher
            .dispatch(&event("customer.subscription.deleted", json!({ "id": "sub_1" })))
            .await
            .unwrap();

        let stored = fixture.reload(&listing).await;
        assert!(!stored.is_featured);
        assert_eq!(stored.subscription_status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn deleting_superseded_subscription_is_ignored() {
        let fixture = Fixture::new();
        let listing = fixture.seed(subscribed).await;

        let result = fixture
            .dispatcher
            .dispatch(&event(
                "customer.subscription.deleted",
                json!({ "id": "sub_old", "metadata": { "listing_id": listing.id.to_string() } }),
            ))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(fixture.reload(&listing).await.is_featured);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Invoices
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invoice_paid_renews_listing() {
        let fixture = Fixture::new();
        let listing = fixture
            .seed(|l| {
                subscribed(l);
                l.mark_past_due().unwrap();
            })
            .await;

        fixture
            .dispatcher
            .dispatch(&event(
                "invoice.paid",
                json!({
                    "subscription": "sub_1",
                    "lines": { "data": [ { "period": { "end": 1709251200 } } ] }
                }),
            ))
            .await
            .unwrap();

        let stored = fixture.reload(&listing).await;
        assert_eq!(stored.subscription_status, SubscriptionStatus::Active);
        assert_eq!(
            stored.featured_until.map(|t| t.as_unix_secs()),
            Some(1709251200)
        );
    }

    #[tokio::test]
    async fn invoice_without_subscription_is_ignored() {
        let fixture = Fixture::new();

        let result = fixture
            .dispatcher
            .dispatch(&event("invoice.payment_succeeded", json!({ "id": "in_1" })))
            .await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
    }

    #[tokio::test]
    async fn invoice_for_unlinked_subscription_is_retryable() {
        let fixture = Fixture::new();

        let result = fixture
            .dispatcher
            .dispatch(&event("invoice.paid", json!({ "subscription": "sub_later" })))
            .await;

        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn invoice_failed_marks_past_due_and_notifies() {
        let fixture = Fixture::new();
        let listing = fixture.seed(subscribed).await;

        fixture
            .dispatcher
            .dispatch(&event(
                "invoice.payment_failed",
                json!({ "subscription": "sub_1", "attempt_count": 1 }),
            ))
            .await
            .unwrap();

        let stored = fixture.reload(&listing).await;
        assert_eq!(stored.subscription_status, SubscriptionStatus::PastDue);
        assert!(stored.is_featured);
        assert_eq!(fixture.emails(), 1);
    }

    #[tokio::test]
    async fn invoice_failed_reads_newer_invoice_layout() {
        let fixture = Fixture::new();
        let listing = fixture.seed(subscribed).await;

        fixture
            .dispatcher
            .dispatch(&event(
                "invoice.payment_failed",
                json!({ "parent": { "subscription_details": { "subscription": "sub_1" } } }),
            ))
            .await
            .unwrap();

        assert_eq!(
            fixture.reload(&listing).await.subscription_status,
            SubscriptionStatus::PastDue
        );
    }
}
