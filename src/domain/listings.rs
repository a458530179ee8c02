//! Listing records mirrored from the backend listing schema.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::profiles::OwnerProfile;
use crate::domain::types::ListingStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: Uuid,
    pub title: String,
    pub city: String,
    pub neighborhood: Option<String>,
    pub property_type: String,
    pub price: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub surface_area: Option<f64>,
    pub status: ListingStatus,
    #[serde(default)]
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub owner_id: Option<Uuid>,
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A listing decorated with its owner's public profile fields.
///
/// Listings without an owner, or whose owner profile could not be resolved,
/// carry `None` in every owner field but are never dropped from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedListing {
    #[serde(flatten)]
    pub listing: ListingRecord,
    pub owner_display_name: Option<String>,
    pub owner_avatar_url: Option<String>,
    pub owner_trust_score: Option<f32>,
    pub owner_identity_verified: Option<bool>,
    pub owner_phone_verified: Option<bool>,
}

impl EnrichedListing {
    /// Wraps a listing with no owner data attached.
    pub fn bare(listing: ListingRecord) -> Self {
        Self {
            listing,
            owner_display_name: None,
            owner_avatar_url: None,
            owner_trust_score: None,
            owner_identity_verified: None,
            owner_phone_verified: None,
        }
    }

    /// Wraps a listing with the owner fields projected from `profile`.
    pub fn with_owner(listing: ListingRecord, profile: &OwnerProfile) -> Self {
        Self {
            listing,
            owner_display_name: profile.display_name.clone(),
            owner_avatar_url: profile.avatar_url.clone(),
            owner_trust_score: profile.trust_score,
            owner_identity_verified: Some(profile.identity_verified),
            owner_phone_verified: Some(profile.phone_verified),
        }
    }

    pub fn id(&self) -> Uuid {
        self.listing.id
    }
}
