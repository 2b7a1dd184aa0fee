//! Payment processor webhook event envelope.
//!
//! Only parsed after the raw body has been authenticated. Fields that the
//! listing handlers do not read are left in `data.object` untouched.

use serde::{Deserialize, Serialize};

use super::errors::WebhookError;

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentEvent {
    /// Event identifier (`evt_...`). Absent ids skip idempotency tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Event type string, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp at which the processor created the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default)]
    pub data: PaymentEventData,
}

/// Event payload container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaymentEventData {
    /// The object the event is about (session, subscription, invoice...).
    #[serde(default)]
    pub object: serde_json::Value,

    /// Previous values of changed attributes on update events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl PaymentEvent {
    /// Parses an already-authenticated request body.
    ///
    /// # Errors
    ///
    /// `WebhookError::InvalidPayload` when the bytes are not a JSON envelope.
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(raw_body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    pub fn kind(&self) -> PaymentEventKind {
        PaymentEventKind::parse(&self.event_type)
    }

    /// Looks up a value in `data.object` by dotted path.
    ///
    /// Numeric segments index into arrays, so `lines.data.0.period.end`
    /// reaches the first invoice line.
    pub fn object_value(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.').try_fold(&self.data.object, |value, key| match value {
            serde_json::Value::Array(items) => {
                key.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => value.get(key),
        })
    }

    /// Non-empty string at `path` in `data.object`.
    pub fn object_str(&self, path: &str) -> Option<&str> {
        self.object_value(path)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn object_i64(&self, path: &str) -> Option<i64> {
        self.object_value(path).and_then(serde_json::Value::as_i64)
    }

    /// Like [`object_str`](Self::object_str) but missing values are an error.
    pub fn require_str(&self, path: &'static str) -> Result<&str, WebhookError> {
        self.object_str(path).ok_or(WebhookError::MissingField(path))
    }

    /// Id used in logs for events that arrive without one.
    pub fn log_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<none>")
    }
}

/// Event types the directory reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentEventKind {
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaid,
    InvoicePaymentFailed,
    Unknown,
}

impl PaymentEventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::SubscriptionCreated => "customer.subscription.created",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaid => "invoice.paid",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Builder for test events.
#[cfg(test)]
pub struct PaymentEventBuilder {
    id: Option<String>,
    event_type: String,
    object: serde_json::Value,
    previous_attributes: Option<serde_json::Value>,
    livemode: bool,
}

#[cfg(test)]
impl Default for PaymentEventBuilder {
    fn default() -> Self {
        Self {
            id: Some("evt_test_123".to_string()),
            event_type: "checkout.session.completed".to_string(),
            object: serde_json::json!({}),
            previous_attributes: None,
            livemode: false,
        }
    }
}

#[cfg(test)]
impl PaymentEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn previous_attributes(mut self, attrs: serde_json::Value) -> Self {
        self.previous_attributes = Some(attrs);
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn build(self) -> PaymentEvent {
        PaymentEvent {
            id: self.id,
            event_type: self.event_type,
            created: Some(1_704_067_200),
            livemode: self.livemode,
            data: PaymentEventData {
                object: self.object,
                previous_attributes: self.previous_attributes,
            },
        }
    }
}
