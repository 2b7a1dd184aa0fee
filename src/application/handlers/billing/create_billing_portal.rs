//! CreateBillingPortalHandler - opens the processor's customer portal.

use std::sync::Arc;

use super::{load_owned_listing, BillingError};
use crate::application::listings::ListingStore;
use crate::domain::foundation::{ListingId, UserId};
use crate::ports::{PaymentProvider, PortalSession};

#[derive(Debug, Clone)]
pub struct CreateBillingPortalCommand {
    pub listing_id: ListingId,
    pub user_id: UserId,
    pub return_url: String,
}

pub struct CreateBillingPortalHandler {
    listings: ListingStore,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl CreateBillingPortalHandler {
    pub fn new(listings: ListingStore, payment_provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            listings,
            payment_provider,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateBillingPortalCommand,
    ) -> Result<PortalSession, BillingError> {
        let listing = load_owned_listing(&self.listings, &cmd.listing_id, &cmd.user_id).await?;

        let customer_id = listing
            .stripe_customer_id
            .as_deref()
            .ok_or(BillingError::NoBillingAccount)?;

        let session = self
            .payment_provider
            .create_portal_session(customer_id, &cmd.return_url)
            .await?;

        tracing::info!(listing_id = %listing.id, "Billing portal session created");
        Ok(session)
    }
}
