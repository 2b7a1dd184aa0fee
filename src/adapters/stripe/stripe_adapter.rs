//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe REST API.
//! Requests are form-encoded and authenticated with the secret key as the
//! basic-auth username.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, "price_featured_monthly");
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Recurring price of the featured tier.
    featured_price_id: String,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: SecretString, featured_price_id: impl Into<String>) -> Self {
        Self {
            api_key,
            featured_price_id: featured_price_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Stripe session response; checkout and portal sessions share this shape.
#[derive(Deserialize)]
struct StripeSessionResponse {
    id: String,
    url: Option<String>,
}

/// Stripe error envelope: `{"error": {"type", "code", "message"}}`.
#[derive(Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Form parameters for a featured-tier subscription checkout.
    ///
    /// The listing id is attached to the session and to the subscription it
    /// creates, so every later webhook can be traced back to the listing.
    fn checkout_params(&self, request: &CreateCheckoutRequest) -> Vec<(&'static str, String)> {
        let listing_id = request.listing_id.to_string();
        let mut params = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.config.featured_price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", listing_id.clone()),
            ("metadata[listing_id]", listing_id.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
            ("subscription_data[metadata][listing_id]", listing_id),
        ];

        match (&request.customer_id, &request.email) {
            (Some(customer), _) => params.push(("customer", customer.clone())),
            (None, Some(email)) => params.push(("customer_email", email.clone())),
            (None, None) => {}
        }

        params
    }

    async fn post_session(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<StripeSessionResponse, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, path, "Stripe request failed");
            return Err(error_from_response(status, &error_text));
        }

        response.json().await.map_err(|e| {
            PaymentError::new(
                PaymentErrorCode::ProviderError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }
}

/// Maps a non-success Stripe response to a `PaymentError`.
fn error_from_response(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        429 => PaymentErrorCode::RateLimitExceeded,
        400 | 402 | 404 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    };

    let error = PaymentError::new(code, message);
    match parsed.and_then(|e| e.error.code.or(e.error.error_type)) {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = self.checkout_params(&request);
        let session = self.post_session("/v1/checkout/sessions", &params).await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider(format!("Checkout session {} has no URL", session.id))
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        let session = self
            .post_session("/v1/billing_portal/sessions", &params)
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider(format!("Portal session {} has no URL", session.id))
        })?;

        Ok(PortalSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ListingId, UserId};

    fn adapter() -> StripePaymentAdapter {
        StripePaymentAdapter::new(StripeConfig::new(
            SecretString::new("sk_test_key".to_string()),
            "price_featured",
        ))
    }

    fn request(customer_id: Option<&str>, email: Option<&str>) -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            listing_id: ListingId::new(),
            user_id: UserId::new("user-1").unwrap(),
            email: email.map(str::to_string),
            customer_id: customer_id.map(str::to_string),
            success_url: "https://dir.example/ok".to_string(),
            cancel_url: "https://dir.example/cancel".to_string(),
        }
    }

    fn param<'a>(params: &'a [(&str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new(SecretString::new("k".to_string()), "price_1");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.featured_price_id, "price_1");
    }

    #[test]
    fn config_with_base_url() {
        let config = StripeConfig::new(SecretString::new("k".to_string()), "price_1")
            .with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout Parameter Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_params_carry_listing_reference_everywhere() {
        let req = request(None, Some("dr@example.com"));
        let params = adapter().checkout_params(&req);
        let listing_id = req.listing_id.to_string();

        assert_eq!(param(&params, "mode"), Some("subscription"));
        assert_eq!(param(&params, "line_items[0][price]"), Some("price_featured"));
        assert_eq!(param(&params, "client_reference_id"), Some(listing_id.as_str()));
        assert_eq!(param(&params, "metadata[listing_id]"), Some(listing_id.as_str()));
        assert_eq!(
            param(&params, "subscription_data[metadata][listing_id]"),
            Some(listing_id.as_str())
        );
    }

    #[test]
    fn checkout_prefers_existing_customer_over_email() {
        let params = adapter().checkout_params(&request(Some("cus_1"), Some("dr@example.com")));

        assert_eq!(param(&params, "customer"), Some("cus_1"));
        assert_eq!(param(&params, "customer_email"), None);
    }

    #[test]
    fn checkout_prefills_email_for_new_customer() {
        let params = adapter().checkout_params(&request(None, Some("dr@example.com")));

        assert_eq!(param(&params, "customer"), None);
        assert_eq!(param(&params, "customer_email"), Some("dr@example.com"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn error_body_message_and_code_are_kept() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such price"}}"#;

        let error = error_from_response(reqwest::StatusCode::BAD_REQUEST, body);

        assert_eq!(error.code, PaymentErrorCode::InvalidRequest);
        assert_eq!(error.message, "No such price");
        assert_eq!(error.provider_code.as_deref(), Some("resource_missing"));
        assert!(!error.retryable);
    }

    #[test]
    fn rate_limit_is_retryable() {
        let error = error_from_response(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(error.code, PaymentErrorCode::RateLimitExceeded);
        assert!(error.retryable);
    }

    #[test]
    fn bad_key_is_authentication_error() {
        let error = error_from_response(reqwest::StatusCode::UNAUTHORIZED, "not json");
        assert_eq!(error.code, PaymentErrorCode::AuthenticationError);
        assert!(error.provider_code.is_none());
    }
}
