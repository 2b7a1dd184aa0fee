//! HandlePaymentWebhookHandler - authenticates and processes payment webhooks.

use crate::domain::webhook::{
    IdempotentWebhookProcessor, PaymentEvent, WebhookAuthenticator, WebhookError,
};
use crate::ports::WebhookResult;

/// Command carrying an inbound webhook exactly as received.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw request body. Never re-serialized before verification.
    pub payload: Vec<u8>,
    /// Signature header value, if the request had one.
    pub signature: Option<String>,
}

/// Handler for inbound payment webhooks.
///
/// Authentication happens on the raw bytes before anything is parsed; a
/// request that fails it never reaches the processor.
pub struct HandlePaymentWebhookHandler {
    authenticator: WebhookAuthenticator,
    processor: IdempotentWebhookProcessor,
}

impl HandlePaymentWebhookHandler {
    pub fn new(authenticator: WebhookAuthenticator, processor: IdempotentWebhookProcessor) -> Self {
        Self {
            authenticator,
            processor,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<WebhookResult, WebhookError> {
        if let Err(e) = self
            .authenticator
            .authenticate(&cmd.payload, cmd.signature.as_deref())
        {
            if matches!(e, WebhookError::MisconfiguredSecret) {
                tracing::error!("Rejecting payment webhook: signing secret is not configured");
            } else {
                tracing::warn!(reason = e.reason(), "Rejecting unauthenticated payment webhook");
            }
            return Err(e);
        }

        let event = PaymentEvent::from_slice(&cmd.payload).map_err(|e| {
            tracing::warn!(reason = e.reason(), error = %e, "Authenticated webhook has invalid payload");
            e
        })?;

        tracing::info!(
            event_id = event.log_id(),
            event_type = %event.event_type,
            livemode = event.livemode,
            "Payment webhook authenticated"
        );

        self.processor.process(event).await
    }
}
