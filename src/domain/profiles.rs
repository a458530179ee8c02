//! Public owner-profile projection used for listing enrichment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The public slice of an owner account exposed next to their listings.
///
/// Derived data only: recomputed on every enrichment pass, never persisted
/// by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub owner_id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub trust_score: Option<f32>,
    #[serde(default)]
    pub identity_verified: bool,
    #[serde(default)]
    pub phone_verified: bool,
}

impl OwnerProfile {
    /// Clamps the trust score into its documented 0-100 range.
    ///
    /// Applied when records cross the backend boundary so downstream code can
    /// rely on the range without re-checking.
    pub fn normalized(mut self) -> Self {
        if let Some(score) = self.trust_score {
            self.trust_score = Some(score.clamp(0.0, 100.0));
        }
        self
    }
}
