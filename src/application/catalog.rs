//! Listing detail reads and owner-side mutations.
//!
//! [`CatalogService`] sits next to the feed: detail views read cache-aside
//! through the shared [`QueryCache`], and every mutation drops the whole
//! listing namespace so the next feed load or detail view observes fresh
//! backend state.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::application::enrichment::EnrichmentService;
use crate::application::sources::{
    CreateListingParams, ListingSource, ListingWriteSource, SourceError, UpdateListingParams,
};
use crate::cache::{LISTING_NAMESPACE, QueryCache, listing_detail_key};
use crate::domain::listings::{EnrichedListing, ListingRecord};

#[derive(Clone)]
pub struct CatalogService {
    listings: Arc<dyn ListingSource>,
    writes: Arc<dyn ListingWriteSource>,
    enrichment: EnrichmentService,
    cache: Arc<QueryCache>,
}

impl CatalogService {
    pub fn new(
        listings: Arc<dyn ListingSource>,
        writes: Arc<dyn ListingWriteSource>,
        enrichment: EnrichmentService,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            listings,
            writes,
            enrichment,
            cache,
        }
    }

    /// Looks up a single listing with its owner fields attached.
    ///
    /// Hits are cached under the detail namespace; an absent listing is
    /// reported as `Ok(None)` and never cached, so a listing published
    /// moments later shows up immediately.
    pub async fn listing(&self, id: Uuid) -> Result<Option<EnrichedListing>, SourceError> {
        let key = listing_detail_key(id);
        if let Some(cached) = self.cache.get::<EnrichedListing>(&key) {
            debug!(listing_id = %id, source = "cache", "listing detail served from cache");
            return Ok(Some(cached));
        }

        let Some(record) = self.listings.fetch_listing(id).await? else {
            return Ok(None);
        };
        let mut enriched = self.enrichment.enrich(vec![record]).await;
        let Some(detail) = enriched.pop() else {
            return Ok(None);
        };
        self.cache.set(&key, &detail, self.cache.ttl());
        Ok(Some(detail))
    }

    pub async fn create(&self, params: CreateListingParams) -> Result<ListingRecord, SourceError> {
        let record = self.writes.create_listing(params).await?;
        info!(listing_id = %record.id, city = %record.city, "created listing");
        self.invalidate_after_mutation();
        Ok(record)
    }

    pub async fn update(
        &self,
        id: Uuid,
        params: UpdateListingParams,
    ) -> Result<ListingRecord, SourceError> {
        let record = self.writes.update_listing(id, params).await?;
        info!(listing_id = %id, "updated listing");
        self.invalidate_after_mutation();
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), SourceError> {
        self.writes.delete_listing(id).await?;
        info!(listing_id = %id, "deleted listing");
        self.invalidate_after_mutation();
        Ok(())
    }

    fn invalidate_after_mutation(&self) {
        let dropped = self.cache.invalidate_prefix(LISTING_NAMESPACE);
        debug!(dropped, "invalidated listing cache after mutation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::query::ListingQuery;
    use crate::application::sources::{ProfileSource, QueryPage};
    use crate::cache::CacheConfig;
    use crate::domain::profiles::OwnerProfile;
    use crate::domain::types::ListingStatus;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;
    use time::macros::datetime;

    struct FakeBackend {
        records: Mutex<HashMap<Uuid, ListingRecord>>,
        fetches: AtomicUsize,
    }

    impl FakeBackend {
        fn with_records(records: Vec<ListingRecord>) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(records.into_iter().map(|r| (r.id, r)).collect()),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListingSource for FakeBackend {
        async fn fetch_page(&self, _query: &ListingQuery) -> Result<QueryPage, SourceError> {
            Ok(QueryPage {
                items: vec![],
                exact_count: Some(0),
            })
        }

        async fn fetch_listing(&self, id: Uuid) -> Result<Option<ListingRecord>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }
    }

    #[async_trait]
    impl ListingWriteSource for FakeBackend {
        async fn create_listing(
            &self,
            params: CreateListingParams,
        ) -> Result<ListingRecord, SourceError> {
            let record = ListingRecord {
                id: Uuid::new_v4(),
                title: params.title,
                city: params.city,
                neighborhood: params.neighborhood,
                property_type: params.property_type,
                price: params.price,
                bedrooms: params.bedrooms,
                bathrooms: params.bathrooms,
                surface_area: params.surface_area,
                status: params.status,
                photos: params.photos,
                latitude: params.latitude,
                longitude: params.longitude,
                owner_id: params.owner_id,
                verified: false,
                created_at: OffsetDateTime::now_utc(),
            };
            self.records.lock().unwrap().insert(record.id, record.clone());
            Ok(record)
        }

        async fn update_listing(
            &self,
            id: Uuid,
            params: UpdateListingParams,
        ) -> Result<ListingRecord, SourceError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&id)
                .ok_or_else(|| SourceError::backend(404, "listing not found"))?;
            if let Some(title) = params.title {
                record.title = title;
            }
            if let Some(price) = params.price {
                record.price = price;
            }
            Ok(record.clone())
        }

        async fn delete_listing(&self, id: Uuid) -> Result<(), SourceError> {
            self.records.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    struct OneProfile(OwnerProfile);

    #[async_trait]
    impl ProfileSource for OneProfile {
        async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OwnerProfile>, SourceError> {
            if ids.contains(&self.0.owner_id) {
                Ok(vec![self.0.clone()])
            } else {
                Ok(vec![])
            }
        }
    }

    struct NoProfiles;

    #[async_trait]
    impl ProfileSource for NoProfiles {
        async fn profiles_by_ids(&self, _ids: &[Uuid]) -> Result<Vec<OwnerProfile>, SourceError> {
            Ok(vec![])
        }
    }

    fn sample_listing(owner_id: Option<Uuid>) -> ListingRecord {
        ListingRecord {
            id: Uuid::from_u128(7),
            title: "Villa Riviera".to_string(),
            city: "Abidjan".to_string(),
            neighborhood: Some("Riviera".to_string()),
            property_type: "house".to_string(),
            price: 450_000.0,
            bedrooms: 4,
            bathrooms: 3,
            surface_area: Some(220.0),
            status: ListingStatus::Available,
            photos: vec!["https://cdn.kasa.ci/p/1.jpg".to_string()],
            latitude: Some(5.35),
            longitude: Some(-3.99),
            owner_id,
            verified: true,
            created_at: datetime!(2026-02-10 08:30 UTC),
        }
    }

    fn catalog(
        backend: &Arc<FakeBackend>,
        profiles: Arc<dyn ProfileSource>,
        cache: &Arc<QueryCache>,
    ) -> CatalogService {
        CatalogService::new(
            backend.clone(),
            backend.clone(),
            EnrichmentService::new(profiles),
            cache.clone(),
        )
    }

    #[tokio::test]
    async fn detail_reads_are_cached_until_a_mutation() {
        let backend = FakeBackend::with_records(vec![sample_listing(None)]);
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let catalog = catalog(&backend, Arc::new(NoProfiles), &cache);
        let id = Uuid::from_u128(7);

        let first = catalog.listing(id).await.unwrap();
        assert_eq!(first.unwrap().listing.title, "Villa Riviera");
        assert_eq!(backend.fetches(), 1);

        catalog.listing(id).await.unwrap();
        assert_eq!(backend.fetches(), 1);

        catalog
            .update(
                id,
                UpdateListingParams {
                    price: Some(500_000.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reread = catalog.listing(id).await.unwrap();
        assert_eq!(backend.fetches(), 2);
        assert_eq!(reread.unwrap().listing.price, 500_000.0);
    }

    #[tokio::test]
    async fn absent_listing_is_reported_and_never_cached() {
        let backend = FakeBackend::with_records(vec![]);
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let catalog = catalog(&backend, Arc::new(NoProfiles), &cache);
        let id = Uuid::from_u128(99);

        assert!(catalog.listing(id).await.unwrap().is_none());
        assert!(catalog.listing(id).await.unwrap().is_none());
        assert_eq!(backend.fetches(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn detail_carries_owner_profile_fields() {
        let owner_id = Uuid::from_u128(42);
        let backend = FakeBackend::with_records(vec![sample_listing(Some(owner_id))]);
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let profile = OwnerProfile {
            owner_id,
            display_name: Some("Mariam K.".to_string()),
            avatar_url: None,
            trust_score: Some(92.0),
            identity_verified: true,
            phone_verified: true,
        };
        let catalog = catalog(&backend, Arc::new(OneProfile(profile)), &cache);

        let detail = catalog.listing(Uuid::from_u128(7)).await.unwrap().unwrap();
        assert_eq!(detail.owner_display_name.as_deref(), Some("Mariam K."));
        assert_eq!(detail.owner_trust_score, Some(92.0));
    }

    #[tokio::test]
    async fn mutations_drop_the_whole_listing_namespace() {
        let backend = FakeBackend::with_records(vec![]);
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let catalog = catalog(&backend, Arc::new(NoProfiles), &cache);

        cache.set(
            "listings:page:v1:created_at.desc:0-11",
            &serde_json::json!({"items": [{"id": 1}]}),
            cache.ttl(),
        );
        cache.set(
            "owners:profile:v1:abc",
            &serde_json::json!({"name": "x"}),
            cache.ttl(),
        );

        catalog
            .create(CreateListingParams {
                title: "Studio Plateau".to_string(),
                city: "Abidjan".to_string(),
                neighborhood: Some("Plateau".to_string()),
                property_type: "studio".to_string(),
                price: 150_000.0,
                bedrooms: 1,
                bathrooms: 1,
                surface_area: Some(35.0),
                status: ListingStatus::Available,
                photos: vec![],
                latitude: None,
                longitude: None,
                owner_id: None,
            })
            .await
            .unwrap();

        assert!(
            cache
                .get::<serde_json::Value>("listings:page:v1:created_at.desc:0-11")
                .is_none()
        );
        assert!(
            cache
                .get::<serde_json::Value>("owners:profile:v1:abc")
                .is_some()
        );
    }

    #[tokio::test]
    async fn delete_removes_the_cached_detail() {
        let backend = FakeBackend::with_records(vec![sample_listing(None)]);
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let catalog = catalog(&backend, Arc::new(NoProfiles), &cache);
        let id = Uuid::from_u128(7);

        catalog.listing(id).await.unwrap();
        assert_eq!(cache.len(), 1);

        catalog.delete(id).await.unwrap();
        assert!(cache.is_empty());
        assert!(catalog.listing(id).await.unwrap().is_none());
    }
}
