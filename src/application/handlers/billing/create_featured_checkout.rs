//! CreateFeaturedCheckoutHandler - starts the featured-tier checkout for a listing.

use std::sync::Arc;

use super::{load_owned_listing, BillingError};
use crate::application::listings::ListingStore;
use crate::domain::foundation::{ListingId, UserId};
use crate::ports::{CheckoutSession, CreateCheckoutRequest, PaymentProvider};

#[derive(Debug, Clone)]
pub struct CreateFeaturedCheckoutCommand {
    pub listing_id: ListingId,
    pub user_id: UserId,
    /// Signed-in user's email, used when the listing has no contact email.
    pub email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Handler for starting a featured listing subscription.
///
/// Nothing is written here; the listing is only featured once the signed
/// `checkout.session.completed` webhook arrives.
pub struct CreateFeaturedCheckoutHandler {
    listings: ListingStore,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl CreateFeaturedCheckoutHandler {
    pub fn new(listings: ListingStore, payment_provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            listings,
            payment_provider,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateFeaturedCheckoutCommand,
    ) -> Result<CheckoutSession, BillingError> {
        let listing = load_owned_listing(&self.listings, &cmd.listing_id, &cmd.user_id).await?;

        if listing.is_featured {
            return Err(BillingError::AlreadyFeatured);
        }

        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                listing_id: listing.id,
                user_id: cmd.user_id,
                email: listing.contact_email.clone().or(cmd.email),
                customer_id: listing.stripe_customer_id.clone(),
                success_url: cmd.success_url,
                cancel_url: cmd.cancel_url,
            })
            .await?;

        tracing::info!(
            listing_id = %listing.id,
            session_id = %session.id,
            "Featured checkout session created"
        );

        Ok(session)
    }
}
