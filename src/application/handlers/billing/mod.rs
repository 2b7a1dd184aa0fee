//! Billing handlers.
//!
//! Hosted checkout and customer portal sessions for the featured tier.

mod create_billing_portal;
mod create_featured_checkout;
mod errors;

pub use create_billing_portal::{CreateBillingPortalCommand, CreateBillingPortalHandler};
pub use create_featured_checkout::{CreateFeaturedCheckoutCommand, CreateFeaturedCheckoutHandler};
pub use errors::BillingError;

use crate::application::listings::ListingStore;
use crate::domain::foundation::{ListingId, UserId};
use crate::domain::listing::FeaturedListing;

/// Loads a listing and checks that `user_id` owns it.
async fn load_owned_listing(
    listings: &ListingStore,
    listing_id: &ListingId,
    user_id: &UserId,
) -> Result<FeaturedListing, BillingError> {
    let listing = listings
        .find_by_id(listing_id)
        .await?
        .ok_or(BillingError::ListingNotFound(*listing_id))?;

    if !listing.is_owned_by(user_id) {
        tracing::warn!(
            listing_id = %listing_id,
            user_id = %user_id,
            "Billing request for listing owned by another practitioner"
        );
        return Err(BillingError::Forbidden);
    }

    Ok(listing)
}
