//! Owner profile lookups against the REST backend.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::application::sources::{ProfileSource, SourceError};
use crate::domain::profiles::OwnerProfile;

use super::{PROFILES_PATH, RestBackend, decode_json};

const PROFILE_COLUMNS: &str =
    "owner_id,display_name,avatar_url,trust_score,identity_verified,phone_verified";

#[async_trait]
impl ProfileSource for RestBackend {
    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OwnerProfile>, SourceError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let joined = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let request = self.client.get(self.endpoint(PROFILES_PATH)?).query(&[
            ("select", PROFILE_COLUMNS.to_string()),
            ("owner_id", format!("in.({joined})")),
        ]);

        let response = self.send(request).await?;
        let rows: Vec<OwnerProfile> = decode_json(response).await?;
        debug!(requested = ids.len(), resolved = rows.len(), "fetched owner profiles");
        // Out-of-range trust scores from the backend are clamped here so the
        // rest of the crate never sees them.
        Ok(rows.into_iter().map(OwnerProfile::normalized).collect())
    }
}
