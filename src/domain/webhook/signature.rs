//! Payment webhook signature verification.
//!
//! The processor signs `"<t>.<raw body>"` with HMAC-SHA256 and sends
//! `t=<unix-timestamp>,v1=<hex>[,v1=<hex>...]` alongside the request.
//! Verification runs over the raw body bytes, before any JSON parsing, and
//! rejects requests whose timestamp falls outside the freshness window.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};

use super::errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Default freshness window (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp the signature was generated at.
    pub timestamp: i64,
    /// Every `v1` value in header order. Values are kept as sent.
    pub signatures: Vec<String>,
    timestamp_text: String,
}

impl SignatureHeader {
    /// Parses a signature header string.
    ///
    /// Segments are split on `,` and then on the first `=`. Segments without
    /// `=` and unknown keys are skipped. A repeated `t` keeps the last value.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedSignature` when `t` or `v1` is absent,
    /// or when `t` is not an integer.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp_text: Option<&str> = None;
        let mut signatures = Vec::new();

        for segment in header.split(',') {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };

            match key {
                "t" => timestamp_text = Some(value),
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp_text = timestamp_text
            .ok_or_else(|| WebhookError::MalformedSignature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedSignature(
                "missing v1 signature".to_string(),
            ));
        }

        let timestamp = timestamp_text
            .parse::<i64>()
            .map_err(|_| WebhookError::MalformedSignature("invalid timestamp".to_string()))?;

        Ok(Self {
            timestamp,
            signatures,
            timestamp_text: timestamp_text.to_string(),
        })
    }

    /// The timestamp exactly as it appeared in the header.
    pub fn timestamp_text(&self) -> &str {
        &self.timestamp_text
    }
}

/// Verifier for payment webhook signatures.
///
/// Holds only a read-only secret, so a single instance can be shared across
/// request handlers.
#[derive(Debug, Clone)]
pub struct WebhookAuthenticator {
    secret: SecretString,
    tolerance_secs: u64,
}

impl WebhookAuthenticator {
    /// Creates an authenticator with the default 300 second tolerance.
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Overrides the freshness window.
    pub fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Returns the freshness window in seconds.
    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    /// True when a non-empty secret is configured.
    pub fn is_configured(&self) -> bool {
        !self.secret.expose_secret().is_empty()
    }

    /// Authenticates a request against the current wall clock.
    ///
    /// # Errors
    ///
    /// - `MisconfiguredSecret` - no secret configured (server fault)
    /// - `MalformedSignature` - header absent or missing `t` / `v1`
    /// - `SignatureMismatch` - no `v1` value matches the computed HMAC
    /// - `StaleTimestamp` - `|now - t|` exceeds the tolerance
    pub fn authenticate(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), WebhookError> {
        self.authenticate_at(raw_body, signature_header, chrono::Utc::now().timestamp())
    }

    /// Same as [`authenticate`](Self::authenticate) with an explicit clock reading.
    pub fn authenticate_at(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
        now: i64,
    ) -> Result<(), WebhookError> {
        check(
            raw_body,
            signature_header,
            self.secret.expose_secret().as_bytes(),
            self.tolerance_secs,
            now,
        )
        .map(|_| ())
    }

    /// Boolean verdict for callers that must not learn which check failed.
    ///
    /// Rejections are logged with their reason. The only error returned is
    /// `MisconfiguredSecret`, which is an operator problem rather than a bad
    /// request.
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<bool, WebhookError> {
        verdict(self.authenticate(raw_body, signature_header))
    }
}

/// Verifies a webhook request in one call.
///
/// Returns `Ok(true)` only when the header is well formed, a `v1` signature
/// matches and the timestamp is within `tolerance_secs` of the current time.
///
/// # Errors
///
/// `WebhookError::MisconfiguredSecret` when `secret` is empty.
pub fn verify(
    raw_body: &[u8],
    signature_header: Option<&str>,
    secret: &[u8],
    tolerance_secs: u64,
) -> Result<bool, WebhookError> {
    verdict(check(
        raw_body,
        signature_header,
        secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    ))
}

/// Computes the lowercase hex HMAC-SHA256 of `"<timestamp>.<payload>"`.
pub fn compute_signature(secret: &[u8], timestamp: i64, payload: &[u8]) -> String {
    sign(secret, &timestamp.to_string(), payload)
}

fn verdict<T>(outcome: Result<T, WebhookError>) -> Result<bool, WebhookError> {
    match outcome {
        Ok(_) => Ok(true),
        Err(WebhookError::MisconfiguredSecret) => {
            tracing::error!("Webhook signing secret is not configured");
            Err(WebhookError::MisconfiguredSecret)
        }
        Err(e) => {
            tracing::warn!(reason = e.reason(), "Webhook authentication failed");
            Ok(false)
        }
    }
}

fn check(
    raw_body: &[u8],
    signature_header: Option<&str>,
    secret: &[u8],
    tolerance_secs: u64,
    now: i64,
) -> Result<SignatureHeader, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MisconfiguredSecret);
    }

    let header = signature_header
        .ok_or_else(|| WebhookError::MalformedSignature("missing header".to_string()))?;
    let header = SignatureHeader::parse(header)?;

    let expected = sign(secret, header.timestamp_text(), raw_body);

    // Every candidate is compared in full.
    let mut matched = Choice::from(0u8);
    for candidate in &header.signatures {
        matched |= constant_time_eq(expected.as_bytes(), candidate.as_bytes());
    }
    if !bool::from(matched) {
        return Err(WebhookError::SignatureMismatch);
    }

    if now.abs_diff(header.timestamp) > tolerance_secs {
        return Err(WebhookError::StaleTimestamp);
    }

    Ok(header)
}

fn sign(secret: &[u8], timestamp_text: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(timestamp_text.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time equality. Only a length difference short-circuits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> Choice {
    if a.len() != b.len() {
        return Choice::from(0u8);
    }
    a.ct_eq(b)
}
