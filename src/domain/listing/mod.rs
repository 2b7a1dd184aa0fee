//! Featured listing billing state.

mod featured_listing;
mod subscription_status;

pub use featured_listing::{FeaturedListing, ListingError, LISTINGS_TABLE};
pub use subscription_status::SubscriptionStatus;
