//! Billing notifications sent to practitioners.
//!
//! Delivery is best effort: a failed send is logged and never fails the
//! webhook that triggered it, otherwise the processor would redeliver an
//! event whose state change already happened.

use std::sync::Arc;

use crate::domain::listing::FeaturedListing;
use crate::ports::{EmailMessage, EmailSender};

#[derive(Clone)]
pub struct BillingNotifier {
    sender: Arc<dyn EmailSender>,
    dashboard_url: String,
}

impl BillingNotifier {
    pub fn new(sender: Arc<dyn EmailSender>, dashboard_url: impl Into<String>) -> Self {
        Self {
            sender,
            dashboard_url: dashboard_url.into(),
        }
    }

    /// Confirms that a listing is now featured.
    pub async fn featured_activated(&self, listing: &FeaturedListing) {
        let body = format!(
            "<p>Hi {name},</p>\
             <p>Your listing is now featured in the directory. Featured listings \
             appear at the top of search results in your area.</p>\
             <p>You can manage billing from your <a href=\"{url}\">dashboard</a>.</p>",
            name = escape_html(&listing.display_name),
            url = escape_html(&self.dashboard_url),
        );
        self.send(listing, "Your listing is now featured", body)
            .await;
    }

    /// Warns that a renewal payment failed and the listing is in its grace period.
    pub async fn payment_failed(&self, listing: &FeaturedListing) {
        let body = format!(
            "<p>Hi {name},</p>\
             <p>We could not process the renewal payment for your featured listing. \
             Your listing stays featured while we retry the charge.</p>\
             <p>Please update your payment method from your \
             <a href=\"{url}\">dashboard</a> to avoid losing featured placement.</p>",
            name = escape_html(&listing.display_name),
            url = escape_html(&self.dashboard_url),
        );
        self.send(listing, "Action needed: featured listing payment failed", body)
            .await;
    }

    async fn send(&self, listing: &FeaturedListing, subject: &str, html: String) {
        let Some(to) = listing.contact_email.as_deref() else {
            tracing::debug!(listing_id = %listing.id, "Listing has no contact email, skipping notification");
            return;
        };

        match self.sender.send(EmailMessage::new(to, subject, html)).await {
            Ok(()) => tracing::info!(listing_id = %listing.id, subject, "Billing email sent"),
            Err(e) => tracing::warn!(
                listing_id = %listing.id,
                error = %e,
                "Failed to send billing email"
            ),
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ListingId, UserId};
    use crate::ports::EmailError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
            if self.fail {
                return Err(EmailError::Network("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn listing(email: Option<&str>) -> FeaturedListing {
        FeaturedListing::new(
            ListingId::new(),
            UserId::new("user-1").unwrap(),
            "Dr. <Script> & Co",
            email.map(String::from),
        )
    }

    #[tokio::test]
    async fn activation_email_goes_to_contact_address() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = BillingNotifier::new(sender.clone(), "https://dir.example/dashboard");

        notifier.featured_activated(&listing(Some("dr@example.com"))).await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "dr@example.com");
        assert!(sent[0].html.contains("https://dir.example/dashboard"));
    }

    #[tokio::test]
    async fn display_name_is_escaped() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = BillingNotifier::new(sender.clone(), "https://dir.example");

        notifier.payment_failed(&listing(Some("dr@example.com"))).await;

        let sent = sender.sent.lock().unwrap();
        assert!(sent[0].html.contains("Dr. &lt;Script&gt; &amp; Co"));
        assert!(!sent[0].html.contains("<Script>"));
    }

    #[tokio::test]
    async fn missing_contact_email_sends_nothing() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = BillingNotifier::new(sender.clone(), "https://dir.example");

        notifier.featured_activated(&listing(None)).await;

        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_does_not_panic() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let notifier = BillingNotifier::new(sender, "https://dir.example");

        notifier.featured_activated(&listing(Some("dr@example.com"))).await;
    }
}
