//! Billing view of a directory listing.
//!
//! Only the columns the featured tier reads or writes are modelled here; the
//! rest of the listing row (bio, specialties, photos) belongs to the web app.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SubscriptionStatus;
use crate::domain::foundation::{ListingId, Timestamp, UserId};
use crate::ports::Row;

/// Backend table holding listings.
pub const LISTINGS_TABLE: &str = "listings";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("Listing has no subscription")]
    NoSubscription,

    #[error("Invalid listing row: {0}")]
    InvalidRow(String),
}

/// A listing and its featured-tier billing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedListing {
    pub id: ListingId,
    pub practitioner_id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    #[serde(default, with = "unix_secs_opt")]
    pub featured_until: Option<Timestamp>,
}

impl FeaturedListing {
    /// A new, never-featured listing.
    pub fn new(
        id: ListingId,
        practitioner_id: UserId,
        display_name: impl Into<String>,
        contact_email: Option<String>,
    ) -> Self {
        Self {
            id,
            practitioner_id,
            display_name: display_name.into(),
            contact_email,
            is_featured: false,
            subscription_status: SubscriptionStatus::Inactive,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            featured_until: None,
        }
    }

    pub fn from_row(row: Row) -> Result<Self, ListingError> {
        serde_json::from_value(serde_json::Value::Object(row))
            .map_err(|e| ListingError::InvalidRow(e.to_string()))
    }

    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(row)) => row,
            _ => Row::new(),
        }
    }

    /// Billing columns only, for partial updates.
    pub fn billing_patch(&self) -> Row {
        let mut row = self.to_row();
        row.retain(|column, _| BILLING_COLUMNS.contains(&column.as_str()));
        row
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.practitioner_id == user_id
    }

    /// Checkout completed: the practitioner is now a paying subscriber.
    pub fn activate(
        &mut self,
        customer_id: impl Into<String>,
        subscription_id: Option<String>,
        featured_until: Option<Timestamp>,
    ) {
        self.stripe_customer_id = Some(customer_id.into());
        if subscription_id.is_some() {
            self.stripe_subscription_id = subscription_id;
        }
        if featured_until.is_some() {
            self.featured_until = featured_until;
        }
        self.subscription_status = SubscriptionStatus::Active;
        self.is_featured = true;
    }

    /// Subscription created or updated: adopt the processor's view.
    pub fn apply_subscription(
        &mut self,
        subscription_id: impl Into<String>,
        status: SubscriptionStatus,
        period_end: Option<Timestamp>,
    ) {
        self.stripe_subscription_id = Some(subscription_id.into());
        self.subscription_status = status;
        self.is_featured = status.grants_featured();
        if period_end.is_some() {
            self.featured_until = period_end;
        }
    }

    /// Invoice paid: renew the featured period.
    pub fn record_payment(&mut self, period_end: Option<Timestamp>) {
        self.subscription_status = SubscriptionStatus::Active;
        self.is_featured = true;
        if period_end.is_some() {
            self.featured_until = period_end;
        }
    }

    /// Renewal payment failed. The listing stays featured during the grace
    /// period while the processor retries the charge.
    pub fn mark_past_due(&mut self) -> Result<(), ListingError> {
        if self.stripe_subscription_id.is_none() {
            return Err(ListingError::NoSubscription);
        }
        self.subscription_status = SubscriptionStatus::PastDue;
        self.is_featured = true;
        Ok(())
    }

    /// Subscription deleted. Safe to call repeatedly.
    pub fn end_subscription(&mut self) {
        self.subscription_status = SubscriptionStatus::Canceled;
        self.is_featured = false;
    }
}

const BILLING_COLUMNS: [&str; 5] = [
    "is_featured",
    "subscription_status",
    "stripe_customer_id",
    "stripe_subscription_id",
    "featured_until",
];

/// `featured_until` is stored as Unix seconds.
mod unix_secs_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::domain::foundation::Timestamp;

    pub fn serialize<S: Serializer>(value: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => s.serialize_some(&ts.as_unix_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        Option::<i64>::deserialize(d)?
            .map(|secs| {
                Timestamp::from_unix_secs(secs)
                    .ok_or_else(|| D::Error::custom("featured_until out of range"))
            })
            .transpose()
    }
}
