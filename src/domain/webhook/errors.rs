//! Webhook error types for payment webhook handling.
//!
//! Covers authentication failures, payload problems after authentication,
//! and dispatch failures, with HTTP status mapping and retryability.

use axum::http::StatusCode;
use thiserror::Error;

use crate::ports::StoreError;

/// Errors that occur while authenticating or processing a payment webhook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Signature header absent, or missing its `t` / `v1` components.
    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    /// No signing secret is configured on this server.
    #[error("Webhook signing secret is not configured")]
    MisconfiguredSecret,

    /// Signed timestamp is outside the freshness window.
    #[error("Timestamp outside tolerance")]
    StaleTimestamp,

    /// Computed HMAC does not match any supplied signature.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// Authenticated body is not a valid event envelope.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Authenticated event lacks a field its handler needs.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Event references a listing we do not know about.
    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Backend store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Another delivery of the same event id is being handled right now.
    #[error("Event already in progress: {0}")]
    InProgress(String),
}

impl WebhookError {
    /// Short machine-readable reason for structured logs.
    ///
    /// Never sent back to the requester.
    pub fn reason(&self) -> &'static str {
        match self {
            WebhookError::MalformedSignature(_) => "malformed_signature",
            WebhookError::MisconfiguredSecret => "misconfigured_secret",
            WebhookError::StaleTimestamp => "stale_timestamp",
            WebhookError::SignatureMismatch => "signature_mismatch",
            WebhookError::InvalidPayload(_) => "invalid_payload",
            WebhookError::MissingField(_) => "missing_field",
            WebhookError::ListingNotFound(_) => "listing_not_found",
            WebhookError::Ignored(_) => "ignored",
            WebhookError::Store(_) => "store_error",
            WebhookError::InProgress(_) => "in_progress",
        }
    }

    /// True for failures of the authenticity/freshness check itself.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MalformedSignature(_)
                | WebhookError::StaleTimestamp
                | WebhookError::SignatureMismatch
        )
    }

    /// Returns true if the payment processor should retry delivering this webhook.
    ///
    /// Retryable errors are temporary: store outages, a listing row that has
    /// not been written yet, a concurrent delivery still in flight, or a secret
    /// that operators still have to provision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::MisconfiguredSecret
                | WebhookError::Store(_)
                | WebhookError::ListingNotFound(_)
                | WebhookError::InProgress(_)
        )
    }

    /// Maps the error to an HTTP status code.
    ///
    /// The processor retries on 5xx and gives up on 4xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::StaleTimestamp | WebhookError::SignatureMismatch => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::MalformedSignature(_)
            | WebhookError::InvalidPayload(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::MisconfiguredSecret
            | WebhookError::ListingNotFound(_)
            | WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,

            WebhookError::InProgress(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Stale and forged requests share one message so the response does not
    /// reveal which check failed.
    pub fn public_message(&self) -> &'static str {
        match self {
            WebhookError::MalformedSignature(_) => "Malformed signature header",
            WebhookError::StaleTimestamp | WebhookError::SignatureMismatch => {
                "Invalid signature"
            }
            WebhookError::InvalidPayload(_) | WebhookError::MissingField(_) => {
                "Invalid event payload"
            }
            WebhookError::Ignored(_) => "Event ignored",
            WebhookError::MisconfiguredSecret
            | WebhookError::ListingNotFound(_)
            | WebhookError::Store(_) => "Internal error",
            WebhookError::InProgress(_) => "Event is being processed, retry later",
        }
    }
}

impl From<StoreError> for WebhookError {
    fn from(err: StoreError) -> Self {
        WebhookError::Store(err.to_string())
    }
}
