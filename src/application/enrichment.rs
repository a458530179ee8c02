//! Batched owner-profile enrichment for listing pages.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::sources::ProfileSource;
use crate::domain::listings::{EnrichedListing, ListingRecord};
use crate::domain::profiles::OwnerProfile;

/// Decorates listing batches with their owners' public profiles.
///
/// Resolution is strictly batched: one lookup per page regardless of how
/// many distinct owners appear, and none at all when the page references no
/// owner. A failed or partial lookup degrades to null owner fields instead
/// of failing the page.
#[derive(Clone)]
pub struct EnrichmentService {
    profiles: Arc<dyn ProfileSource>,
}

impl EnrichmentService {
    pub fn new(profiles: Arc<dyn ProfileSource>) -> Self {
        Self { profiles }
    }

    pub async fn enrich(&self, listings: Vec<ListingRecord>) -> Vec<EnrichedListing> {
        let owner_ids: BTreeSet<Uuid> = listings
            .iter()
            .filter_map(|listing| listing.owner_id)
            .collect();
        if owner_ids.is_empty() {
            return listings.into_iter().map(EnrichedListing::bare).collect();
        }

        let ids: Vec<Uuid> = owner_ids.into_iter().collect();
        let profiles: HashMap<Uuid, OwnerProfile> =
            match self.profiles.profiles_by_ids(&ids).await {
                Ok(profiles) => profiles
                    .into_iter()
                    .map(|profile| (profile.owner_id, profile))
                    .collect(),
                Err(err) => {
                    warn!(
                        owners = ids.len(),
                        error = %err,
                        "owner profile lookup failed; serving listings without owner data"
                    );
                    HashMap::new()
                }
            };

        debug!(
            owners = ids.len(),
            resolved = profiles.len(),
            "enriched listing page"
        );

        listings
            .into_iter()
            .map(
                |listing| match listing.owner_id.and_then(|id| profiles.get(&id)) {
                    Some(profile) => EnrichedListing::with_owner(listing, profile),
                    None => EnrichedListing::bare(listing),
                },
            )
            .collect()
    }
}
