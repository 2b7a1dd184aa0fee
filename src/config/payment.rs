//! Payment configuration

use axum::http::HeaderName;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::webhook::DEFAULT_TOLERANCE_SECS;

/// Upper bound on webhook record retention, about ten years.
pub const MAX_WEBHOOK_RETENTION_DAYS: u32 = 3650;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    #[serde(default = "empty_secret")]
    pub stripe_api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    ///
    /// May be left unset; webhooks are then refused with a server error
    /// until it is configured.
    #[serde(default = "empty_secret")]
    pub stripe_webhook_secret: SecretString,

    /// Recurring price of the featured tier
    #[serde(default)]
    pub featured_price_id: String,

    /// Request header carrying the webhook signature
    #[serde(default = "default_signature_header")]
    pub signature_header: String,

    /// Accepted distance between webhook timestamp and server clock
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: u64,

    /// Days to keep handled webhook records. Redeliveries older than this
    /// are no longer recognised as duplicates.
    #[serde(default = "default_retention_days")]
    pub webhook_retention_days: u32,

    /// Stripe API base URL
    #[serde(default = "default_api_base_url")]
    pub stripe_api_base_url: String,

    /// Public URL of the directory web app (checkout redirects, emails)
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    /// Whether a webhook signing secret is present
    pub fn has_webhook_secret(&self) -> bool {
        !self.stripe_webhook_secret.expose_secret().is_empty()
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.app_url.trim_end_matches('/'))
    }

    pub fn checkout_success_url(&self) -> String {
        format!("{}?checkout=success", self.dashboard_url())
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}?checkout=cancelled", self.dashboard_url())
    }

    /// Records processed before the returned instant may be purged.
    ///
    /// `None` when the retention reaches past the representable range.
    pub fn webhook_retention_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Duration::try_days(i64::from(self.webhook_retention_days))
            .and_then(|retention| now.checked_sub_signed(retention))
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if !api_key.starts_with("sk_") && !api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }

        if self.has_webhook_secret()
            && !self.stripe_webhook_secret.expose_secret().starts_with("whsec_")
        {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.featured_price_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__FEATURED_PRICE_ID"));
        }
        if !self.featured_price_id.starts_with("price_") {
            return Err(ValidationError::InvalidPriceId);
        }

        if HeaderName::from_bytes(self.signature_header.as_bytes()).is_err() {
            return Err(ValidationError::InvalidSignatureHeader);
        }
        if self.webhook_tolerance_secs == 0 || self.webhook_tolerance_secs > 3600 {
            return Err(ValidationError::InvalidWebhookTolerance);
        }
        if !(1..=MAX_WEBHOOK_RETENTION_DAYS).contains(&self.webhook_retention_days) {
            return Err(ValidationError::InvalidWebhookRetention);
        }

        if !self.app_url.starts_with("http://") && !self.app_url.starts_with("https://") {
            return Err(ValidationError::InvalidAppUrl);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: empty_secret(),
            stripe_webhook_secret: empty_secret(),
            featured_price_id: String::new(),
            signature_header: default_signature_header(),
            webhook_tolerance_secs: default_webhook_tolerance(),
            webhook_retention_days: default_retention_days(),
            stripe_api_base_url: default_api_base_url(),
            app_url: default_app_url(),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_signature_header() -> String {
    "Stripe-Signature".to_string()
}

fn default_webhook_tolerance() -> u64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_retention_days() -> u32 {
    30
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_app_url() -> String {
    "http://localhost:5173".to_string()
}
