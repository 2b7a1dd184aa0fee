//! Typed access to listing rows on the backend store.

use std::sync::Arc;

use crate::domain::foundation::{ListingId, UserId};
use crate::domain::listing::{FeaturedListing, LISTINGS_TABLE};
use crate::ports::{BackendStore, Filter, StoreError};

/// Reads and writes [`FeaturedListing`] rows.
#[derive(Clone)]
pub struct ListingStore {
    store: Arc<dyn BackendStore>,
}

impl ListingStore {
    pub fn new(store: Arc<dyn BackendStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_id(&self, id: &ListingId) -> Result<Option<FeaturedListing>, StoreError> {
        self.find_one(Filter::new().eq("id", id.to_string())).await
    }

    pub async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<FeaturedListing>, StoreError> {
        self.find_one(Filter::new().eq("stripe_subscription_id", subscription_id))
            .await
    }

    pub async fn find_by_practitioner(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FeaturedListing>, StoreError> {
        self.store
            .select(
                LISTINGS_TABLE,
                &Filter::new().eq("practitioner_id", user_id.as_str()),
            )
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn insert(&self, listing: &FeaturedListing) -> Result<(), StoreError> {
        self.store.insert(LISTINGS_TABLE, listing.to_row()).await?;
        Ok(())
    }

    /// Writes the billing columns of `listing`.
    ///
    /// Returns false when no row with the listing's id exists.
    pub async fn save_billing(&self, listing: &FeaturedListing) -> Result<bool, StoreError> {
        let updated = self
            .store
            .update(
                LISTINGS_TABLE,
                &Filter::new().eq("id", listing.id.to_string()),
                listing.billing_patch(),
            )
            .await?;
        Ok(!updated.is_empty())
    }

    async fn find_one(&self, filter: Filter) -> Result<Option<FeaturedListing>, StoreError> {
        self.store
            .select_one(LISTINGS_TABLE, &filter)
            .await?
            .map(decode)
            .transpose()
    }
}

fn decode(row: crate::ports::Row) -> Result<FeaturedListing, StoreError> {
    FeaturedListing::from_row(row).map_err(|e| StoreError::Decode(e.to_string()))
}
