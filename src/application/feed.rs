//! Paginated listing feed.
//!
//! [`ListingFeed`] is the pagination controller over the listing backend. It
//! owns the page cursor, total-count tracking, and the single-flight guard;
//! builds queries through [`crate::application::query`]; short-circuits
//! repeat first-page loads through the shared [`QueryCache`]; and decorates
//! every fetched page through [`EnrichmentService`] before exposing it.
//!
//! Every entry point resolves to a [`FeedSnapshot`]. Failures surface as
//! state (phase plus a sanitized message), never as `Err`, so a consumer can
//! always render whatever the feed last knew.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::enrichment::EnrichmentService;
use crate::application::lock::{rw_read, rw_write};
use crate::application::query::ListingQuery;
use crate::application::sources::{ListingSource, SourceError};
use crate::cache::{QueryCache, listing_page_key};
use crate::domain::filters::{ListingFilter, SortKey};
use crate::domain::listings::EnrichedListing;

const SOURCE: &str = "application::feed";

pub const DEFAULT_PAGE_SIZE: u32 = 12;

const MAX_ERROR_MESSAGE_CHARS: usize = 200;
const GENERIC_FETCH_ERROR: &str = "Something went wrong while loading listings. Please try again.";

const METRIC_FEED_FETCH_MS: &str = "kasa_feed_fetch_ms";
const METRIC_FEED_STALE_DROP: &str = "kasa_feed_stale_drop_total";
const METRIC_FEED_END_OF_DATA: &str = "kasa_feed_end_of_data_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    LoadingMore,
    Ready,
    Failed,
}

/// Point-in-time view of the feed handed to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<EnrichedListing>,
    pub phase: FeedPhase,
    pub error: Option<String>,
    pub has_more: bool,
    /// Best-effort match count: the backend's exact count when known,
    /// otherwise the number of items loaded so far.
    pub total_count: u64,
}

impl FeedSnapshot {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, FeedPhase::Loading | FeedPhase::LoadingMore)
    }
}

/// Identity of one outgoing fetch: the pagination generation it was issued
/// under plus the fingerprint of the applied search. A response is applied
/// only while both still match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequestTag {
    generation: u64,
    fingerprint: u64,
}

/// First-page payload as written to the query cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedPage {
    items: Vec<EnrichedListing>,
    exact_count: Option<u64>,
}

#[derive(Debug)]
struct FeedState {
    items: Vec<EnrichedListing>,
    filter: ListingFilter,
    sort: SortKey,
    page_size: u32,
    phase: FeedPhase,
    error: Option<String>,
    has_more: bool,
    next_page: u32,
    exact_total: Option<u64>,
    generation: u64,
    in_flight: Option<RequestTag>,
}

impl FeedState {
    fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            filter: ListingFilter::default(),
            sort: SortKey::default(),
            page_size: page_size.max(1),
            phase: FeedPhase::Idle,
            error: None,
            has_more: true,
            next_page: 0,
            exact_total: None,
            generation: 0,
            in_flight: None,
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: self.items.clone(),
            phase: self.phase,
            error: self.error.clone(),
            has_more: self.has_more,
            total_count: self.exact_total.unwrap_or(self.items.len() as u64),
        }
    }

    fn current_tag(&self) -> RequestTag {
        RequestTag {
            generation: self.generation,
            fingerprint: search_fingerprint(&self.filter, self.sort, self.page_size),
        }
    }

    fn matches(&self, tag: RequestTag) -> bool {
        self.current_tag() == tag
    }

    /// Re-arms the session at page 0 for the currently applied search and
    /// claims the in-flight slot, superseding any outstanding fetch.
    fn begin_reload(&mut self) -> RequestTag {
        self.generation += 1;
        self.phase = FeedPhase::Loading;
        self.error = None;
        self.has_more = true;
        self.next_page = 0;
        self.exact_total = None;
        let tag = self.current_tag();
        self.in_flight = Some(tag);
        tag
    }

    fn apply_page(
        &mut self,
        page: u32,
        items: Vec<EnrichedListing>,
        exact_count: Option<u64>,
        requested: u64,
    ) {
        let received = items.len() as u64;
        if page == 0 {
            self.items = items;
        } else {
            self.items.extend(items);
        }
        if exact_count.is_some() {
            self.exact_total = exact_count;
        }
        self.next_page = page + 1;
        self.phase = FeedPhase::Ready;
        self.error = None;
        self.recompute_has_more(received, requested);
    }

    /// When the backend supplied an exact count it wins; otherwise a page
    /// shorter than requested means the end was reached.
    fn recompute_has_more(&mut self, received: u64, requested: u64) {
        self.has_more = match self.exact_total {
            Some(total) => (self.items.len() as u64) < total,
            None => received == requested,
        };
    }
}

/// Clears the in-flight slot when a fetch finishes, on every exit path.
///
/// The slot is only released if it still belongs to this fetch; a
/// superseding search or refresh takes the slot over and must keep it.
struct FlightGuard {
    state: Arc<RwLock<FeedState>>,
    tag: RequestTag,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut state = rw_write(&self.state, SOURCE, "flight_guard.release");
        if state.in_flight == Some(self.tag) {
            state.in_flight = None;
        }
    }
}

/// Infinite-scroll pagination controller for listing search.
#[derive(Clone)]
pub struct ListingFeed {
    listings: Arc<dyn ListingSource>,
    enrichment: EnrichmentService,
    cache: Arc<QueryCache>,
    state: Arc<RwLock<FeedState>>,
}

impl ListingFeed {
    pub fn new(
        listings: Arc<dyn ListingSource>,
        enrichment: EnrichmentService,
        cache: Arc<QueryCache>,
        page_size: u32,
    ) -> Self {
        Self {
            listings,
            enrichment,
            cache,
            state: Arc::new(RwLock::new(FeedState::new(page_size))),
        }
    }

    /// Current state without touching the backend.
    pub fn snapshot(&self) -> FeedSnapshot {
        rw_read(&self.state, SOURCE, "snapshot").snapshot()
    }

    /// Applies a search and loads its first page.
    ///
    /// A filter or sort differing from the applied set resets the session to
    /// page 0 and supersedes any outstanding fetch. Re-applying the identical
    /// search over a ready or already-loading feed returns the current
    /// snapshot without issuing anything.
    pub async fn search(&self, filter: ListingFilter, sort: SortKey) -> FeedSnapshot {
        let (tag, query) = {
            let mut state = rw_write(&self.state, SOURCE, "search");
            let unchanged = state.filter == filter && state.sort == sort;
            if unchanged {
                match state.phase {
                    FeedPhase::Ready => return state.snapshot(),
                    FeedPhase::Loading | FeedPhase::LoadingMore if state.in_flight.is_some() => {
                        return state.snapshot();
                    }
                    _ => {}
                }
            }
            state.filter = filter;
            state.sort = sort;
            let tag = state.begin_reload();
            let query = ListingQuery::build(&state.filter, state.sort, 0, state.page_size);
            debug!(
                generation = tag.generation,
                fingerprint = %format_args!("{:016x}", tag.fingerprint),
                "loading first listing page"
            );
            (tag, query)
        };
        self.run_fetch(tag, query, 0, true).await
    }

    /// Loads the next page and appends it.
    ///
    /// No-op while no more pages remain, a fetch is already in flight, or no
    /// page has loaded yet for the applied search.
    pub async fn load_more(&self) -> FeedSnapshot {
        let (tag, query, page) = {
            let mut state = rw_write(&self.state, SOURCE, "load_more");
            if !state.has_more || state.in_flight.is_some() || state.phase != FeedPhase::Ready {
                debug!(
                    has_more = state.has_more,
                    in_flight = state.in_flight.is_some(),
                    phase = ?state.phase,
                    "load_more is a no-op"
                );
                return state.snapshot();
            }
            state.phase = FeedPhase::LoadingMore;
            let tag = state.current_tag();
            state.in_flight = Some(tag);
            let page = state.next_page;
            let query = ListingQuery::build(&state.filter, state.sort, page, state.page_size);
            (tag, query, page)
        };
        self.run_fetch(tag, query, page, false).await
    }

    /// Reloads page 0 for the applied search, bypassing the cached first
    /// page and superseding any outstanding fetch.
    pub async fn refresh(&self) -> FeedSnapshot {
        let (tag, query) = {
            let mut state = rw_write(&self.state, SOURCE, "refresh");
            let tag = state.begin_reload();
            let query = ListingQuery::build(&state.filter, state.sort, 0, state.page_size);
            debug!(generation = tag.generation, "refreshing listing feed");
            (tag, query)
        };
        self.cache.remove(&listing_page_key(&query));
        self.run_fetch(tag, query, 0, false).await
    }

    /// Changes the page size. A change resets the session; the next `search`
    /// starts over from page 0.
    pub fn set_page_size(&self, page_size: u32) -> FeedSnapshot {
        let mut state = rw_write(&self.state, SOURCE, "set_page_size");
        let page_size = page_size.max(1);
        if state.page_size != page_size {
            state.page_size = page_size;
            state.generation += 1;
            state.items.clear();
            state.exact_total = None;
            state.next_page = 0;
            state.has_more = true;
            state.error = None;
            state.phase = FeedPhase::Idle;
        }
        state.snapshot()
    }

    async fn run_fetch(
        &self,
        tag: RequestTag,
        query: ListingQuery,
        page: u32,
        read_cache: bool,
    ) -> FeedSnapshot {
        let _guard = FlightGuard {
            state: Arc::clone(&self.state),
            tag,
        };
        let key = listing_page_key(&query);

        if read_cache && page == 0 {
            if let Some(cached) = self.cache.get::<CachedPage>(&key) {
                let mut state = rw_write(&self.state, SOURCE, "run_fetch.cached");
                if state.matches(tag) {
                    debug!(page, source = "cache", "listing page served from cache");
                    state.apply_page(page, cached.items, cached.exact_count, query.range.len());
                } else {
                    counter!(METRIC_FEED_STALE_DROP).increment(1);
                }
                return state.snapshot();
            }
        }

        let started = Instant::now();
        let outcome = match self.listings.fetch_page(&query).await {
            Ok(fetched) => {
                let enriched = self.enrichment.enrich(fetched.items).await;
                histogram!(METRIC_FEED_FETCH_MS).record(started.elapsed().as_millis() as f64);
                Ok((enriched, fetched.exact_count))
            }
            Err(err) => Err(err),
        };

        let mut state = rw_write(&self.state, SOURCE, "run_fetch.apply");
        if !state.matches(tag) {
            counter!(METRIC_FEED_STALE_DROP).increment(1);
            debug!(
                generation = tag.generation,
                page, "dropping stale response for superseded search"
            );
            return state.snapshot();
        }

        match outcome {
            Ok((items, exact_count)) => {
                if page == 0 {
                    self.cache.set(
                        &key,
                        &CachedPage {
                            items: items.clone(),
                            exact_count,
                        },
                        self.cache.ttl(),
                    );
                }
                state.apply_page(page, items, exact_count, query.range.len());
            }
            Err(err) if err.is_end_of_data() => {
                counter!(METRIC_FEED_END_OF_DATA).increment(1);
                debug!(page, "requested range is past the end; feed complete");
                state.has_more = false;
                state.error = None;
                state.phase = FeedPhase::Ready;
            }
            Err(err) => {
                let message = user_message(&err);
                if page == 0 {
                    warn!(error = %err, "first listing page failed");
                    state.items.clear();
                    state.exact_total = None;
                    state.has_more = false;
                    state.phase = FeedPhase::Failed;
                } else {
                    warn!(error = %err, page, "load_more failed; keeping loaded pages");
                    state.phase = FeedPhase::Ready;
                }
                state.error = Some(message);
            }
        }
        state.snapshot()
    }
}

fn search_fingerprint(filter: &ListingFilter, sort: SortKey, page_size: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    filter.hash(&mut hasher);
    sort.hash(&mut hasher);
    page_size.hash(&mut hasher);
    hasher.finish()
}

fn user_message(err: &SourceError) -> String {
    match err {
        SourceError::Backend { message, .. } => sanitize_error_message(message),
        other => sanitize_error_message(&other.to_string()),
    }
}

/// Replaces machine-looking backend messages with a generic sentence and
/// bounds the length of whatever is shown.
fn sanitize_error_message(raw: &str) -> String {
    let trimmed = raw.trim();
    let machine_readable = matches!(trimmed.chars().next(), Some('{' | '[' | '<'));
    if trimmed.is_empty() || machine_readable {
        return GENERIC_FETCH_ERROR.to_string();
    }
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let mut clipped: String = trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        clipped.push_str("...");
        clipped
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sources::{ProfileSource, QueryPage};
    use crate::cache::CacheConfig;
    use crate::domain::listings::ListingRecord;
    use crate::domain::profiles::OwnerProfile;
    use crate::domain::types::ListingStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use time::macros::datetime;
    use tokio::sync::Notify;
    use uuid::Uuid;

    fn sample_listing(n: u32) -> ListingRecord {
        ListingRecord {
            id: Uuid::from_u128(u128::from(n) + 1),
            title: format!("Appartement {n}"),
            city: "Abidjan".to_string(),
            neighborhood: Some("Cocody".to_string()),
            property_type: "apartment".to_string(),
            price: 100_000.0 + f64::from(n),
            bedrooms: 2,
            bathrooms: 1,
            surface_area: Some(60.0),
            status: ListingStatus::Available,
            photos: vec![],
            latitude: None,
            longitude: None,
            owner_id: None,
            verified: false,
            created_at: datetime!(2026-03-01 10:00 UTC),
        }
    }

    fn page(range: std::ops::Range<u32>, exact_count: Option<u64>) -> QueryPage {
        QueryPage {
            items: range.map(sample_listing).collect(),
            exact_count,
        }
    }

    struct NoProfiles;

    #[async_trait]
    impl ProfileSource for NoProfiles {
        async fn profiles_by_ids(&self, _ids: &[Uuid]) -> Result<Vec<OwnerProfile>, SourceError> {
            Ok(vec![])
        }
    }

    /// Listing source that pops pre-scripted responses in order.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<QueryPage, SourceError>>>,
        calls: AtomicUsize,
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl ScriptedSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                gate: Mutex::new(None),
            })
        }

        fn push(&self, response: Result<QueryPage, SourceError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Makes the next fetch wait until the returned handle is notified.
        fn gate_next(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.gate.lock().unwrap() = Some(gate.clone());
            gate
        }
    }

    #[async_trait]
    impl ListingSource for ScriptedSource {
        async fn fetch_page(&self, _query: &ListingQuery) -> Result<QueryPage, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::backend(500, "script exhausted")))
        }

        async fn fetch_listing(&self, _id: Uuid) -> Result<Option<ListingRecord>, SourceError> {
            Ok(None)
        }
    }

    fn cache() -> Arc<QueryCache> {
        Arc::new(QueryCache::new(CacheConfig::default()))
    }

    fn feed(source: &Arc<ScriptedSource>, cache: &Arc<QueryCache>, page_size: u32) -> ListingFeed {
        ListingFeed::new(
            source.clone(),
            EnrichmentService::new(Arc::new(NoProfiles)),
            cache.clone(),
            page_size,
        )
    }

    #[tokio::test]
    async fn pages_accumulate_until_exact_count_is_reached() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(5))));
        source.push(Ok(page(2..4, Some(5))));
        source.push(Ok(page(4..5, Some(5))));
        let feed = feed(&source, &cache(), 2);

        let first = feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.total_count, 5);
        assert_eq!(first.phase, FeedPhase::Ready);

        let second = feed.load_more().await;
        assert_eq!(second.items.len(), 4);
        assert!(second.has_more);

        let third = feed.load_more().await;
        assert_eq!(third.items.len(), 5);
        assert!(!third.has_more);

        // End of data reached: further calls touch nothing.
        let calls_before = source.calls();
        let fourth = feed.load_more().await;
        assert_eq!(fourth.items.len(), 5);
        assert_eq!(source.calls(), calls_before);
    }

    #[tokio::test]
    async fn pages_preserve_arrival_order() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(4))));
        source.push(Ok(page(2..4, Some(4))));
        let feed = feed(&source, &cache(), 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        let snapshot = feed.load_more().await;
        let titles: Vec<&str> = snapshot
            .items
            .iter()
            .map(|item| item.listing.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec![
                "Appartement 0",
                "Appartement 1",
                "Appartement 2",
                "Appartement 3"
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_load_more_issues_a_single_fetch() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(6))));
        source.push(Ok(page(2..4, Some(6))));
        let feed = feed(&source, &cache(), 2);
        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;

        let gate = source.gate_next();
        let racing = feed.clone();
        let stalled = tokio::spawn(async move { racing.load_more().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Guard is held by the stalled fetch: this one must back off.
        let noop = feed.load_more().await;
        assert!(noop.is_loading());
        assert_eq!(noop.items.len(), 2);
        assert_eq!(source.calls(), 2);

        gate.notify_one();
        let settled = stalled.await.unwrap();
        assert!(!settled.is_loading());
        assert_eq!(settled.items.len(), 4);
        assert_eq!(source.calls(), 2);

        let ids: Vec<Uuid> = settled.items.iter().map(|item| item.id()).collect();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
    }

    #[tokio::test]
    async fn superseded_response_is_dropped() {
        let source = ScriptedSource::new();
        // The stalled fetch resolves last, so the winning search pops the
        // first scripted page and the loser pops the second.
        source.push(Ok(page(0..2, Some(2))));
        source.push(Ok(page(10..12, Some(2))));
        let feed = feed(&source, &cache(), 2);

        let gate = source.gate_next();
        let superseded = feed.clone();
        let stalled = tokio::spawn(async move {
            superseded
                .search(
                    ListingFilter {
                        city: Some("Abidjan".to_string()),
                        ..Default::default()
                    },
                    SortKey::NewestFirst,
                )
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let yamoussoukro = ListingFilter {
            city: Some("Yamoussoukro".to_string()),
            ..Default::default()
        };
        let current = feed.search(yamoussoukro, SortKey::NewestFirst).await;
        assert_eq!(current.items[0].listing.title, "Appartement 0");

        gate.notify_one();
        let stale_snapshot = stalled.await.unwrap();
        // The superseded search reports whatever is current, not its own page.
        assert_eq!(stale_snapshot.items[0].listing.title, "Appartement 0");
        assert_eq!(feed.snapshot().items[0].listing.title, "Appartement 0");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn range_past_the_end_is_not_an_error() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, None)));
        source.push(Ok(page(2..4, None)));
        source.push(Err(SourceError::RangeNotSatisfiable));
        let feed = feed(&source, &cache(), 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        feed.load_more().await;
        let snapshot = feed.load_more().await;

        assert_eq!(snapshot.items.len(), 4);
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.phase, FeedPhase::Ready);

        let calls_before = source.calls();
        feed.load_more().await;
        assert_eq!(source.calls(), calls_before);
    }

    #[tokio::test]
    async fn load_more_failure_keeps_loaded_pages() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, None)));
        source.push(Err(SourceError::backend(503, "service unavailable")));
        source.push(Ok(page(2..4, None)));
        let feed = feed(&source, &cache(), 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        let failed = feed.load_more().await;
        assert_eq!(failed.items.len(), 2);
        assert_eq!(failed.error.as_deref(), Some("service unavailable"));
        assert_eq!(failed.phase, FeedPhase::Ready);
        assert!(failed.has_more);

        // The retry fetches the same page again and clears the message.
        let retried = feed.load_more().await;
        assert_eq!(retried.items.len(), 4);
        assert_eq!(retried.error, None);
    }

    #[tokio::test]
    async fn first_page_failure_clears_the_result_set() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(4))));
        source.push(Err(SourceError::transport("connection refused")));
        source.push(Ok(page(0..2, Some(4))));
        let feed = feed(&source, &cache(), 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        let failed = feed.refresh().await;
        assert!(failed.items.is_empty());
        assert_eq!(failed.phase, FeedPhase::Failed);
        assert!(failed.error.is_some());

        // A failed feed accepts the same search again.
        let recovered = feed
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert_eq!(recovered.items.len(), 2);
        assert_eq!(recovered.phase, FeedPhase::Ready);
    }

    #[tokio::test]
    async fn identical_search_over_ready_feed_is_served_locally() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(2))));
        let feed = feed(&source, &cache(), 2);

        let filter = ListingFilter {
            city: Some("Abidjan".to_string()),
            ..Default::default()
        };
        feed.search(filter.clone(), SortKey::NewestFirst).await;
        assert_eq!(source.calls(), 1);

        let repeat = feed.search(filter, SortKey::NewestFirst).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(repeat.items.len(), 2);
    }

    #[tokio::test]
    async fn changing_sort_resets_the_session() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(10))));
        source.push(Ok(page(2..4, Some(10))));
        source.push(Ok(page(10..12, Some(10))));
        let feed = feed(&source, &cache(), 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        feed.load_more().await;
        assert_eq!(feed.snapshot().items.len(), 4);

        let resorted = feed
            .search(ListingFilter::default(), SortKey::PriceAscending)
            .await;
        assert_eq!(resorted.items.len(), 2);
        assert_eq!(resorted.items[0].listing.title, "Appartement 10");
        assert!(resorted.has_more);
    }

    #[tokio::test]
    async fn exact_count_wins_over_full_page_heuristic() {
        let source = ScriptedSource::new();
        // A full page, but the exact count says this is everything.
        source.push(Ok(page(0..2, Some(2))));
        let feed = feed(&source, &cache(), 2);

        let snapshot = feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        assert_eq!(snapshot.items.len(), 2);
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn short_page_without_count_ends_the_feed() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..1, None)));
        let feed = feed(&source, &cache(), 2);

        let snapshot = feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        assert_eq!(snapshot.items.len(), 1);
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.total_count, 1);
    }

    #[tokio::test]
    async fn refresh_bypasses_the_cached_first_page() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(2))));
        source.push(Ok(page(0..2, Some(2))));
        let shared = cache();
        let feed = feed(&source, &shared, 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(shared.len(), 1);

        let refreshed = feed.refresh().await;
        assert_eq!(source.calls(), 2);
        assert_eq!(refreshed.items.len(), 2);
        assert_eq!(refreshed.phase, FeedPhase::Ready);
    }

    #[tokio::test]
    async fn first_page_is_served_from_the_shared_cache() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(2))));
        let shared = cache();
        let first_consumer = feed(&source, &shared, 2);
        let second_consumer = feed(&source, &shared, 2);

        let loaded = first_consumer
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert_eq!(source.calls(), 1);

        let cached = second_consumer
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert_eq!(source.calls(), 1);
        assert_eq!(cached.items, loaded.items);
        assert_eq!(cached.total_count, 2);
        assert!(!cached.has_more);
    }

    #[tokio::test]
    async fn expired_cache_entry_triggers_exactly_one_refetch() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(2))));
        source.push(Ok(page(0..2, Some(2))));
        let shared = cache();
        let consumer = feed(&source, &shared, 2);

        consumer
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert_eq!(source.calls(), 1);

        // Age the cached entry out, then come back as a fresh consumer.
        let key = listing_page_key(&ListingQuery::build(
            &ListingFilter::default(),
            SortKey::NewestFirst,
            0,
            2,
        ));
        shared.set(
            &key,
            &CachedPage {
                items: consumer.snapshot().items,
                exact_count: Some(2),
            },
            Duration::ZERO,
        );

        let returning = feed(&source, &shared, 2);
        returning
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn empty_first_page_is_not_cached() {
        let source = ScriptedSource::new();
        source.push(Ok(QueryPage {
            items: vec![],
            exact_count: Some(0),
        }));
        source.push(Ok(QueryPage {
            items: vec![],
            exact_count: Some(0),
        }));
        let shared = cache();
        let feed_one = feed(&source, &shared, 2);
        let feed_two = feed(&source, &shared, 2);

        let empty = feed_one
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert!(empty.items.is_empty());
        assert!(!empty.has_more);
        assert_eq!(empty.total_count, 0);
        assert_eq!(empty.phase, FeedPhase::Ready);
        assert!(shared.is_empty());

        // The next consumer re-queries instead of trusting an empty cache.
        feed_two
            .search(ListingFilter::default(), SortKey::NewestFirst)
            .await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn page_size_change_resets_the_session() {
        let source = ScriptedSource::new();
        source.push(Ok(page(0..2, Some(4))));
        source.push(Ok(page(0..3, Some(4))));
        let feed = feed(&source, &cache(), 2);

        feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        let resized = feed.set_page_size(3);
        assert!(resized.items.is_empty());
        assert_eq!(resized.phase, FeedPhase::Idle);

        let reloaded = feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        assert_eq!(reloaded.items.len(), 3);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn machine_readable_backend_errors_are_replaced() {
        let source = ScriptedSource::new();
        source.push(Err(SourceError::backend(
            400,
            r#"{"code":"PGRST103","message":"invalid range"}"#,
        )));
        let feed = feed(&source, &cache(), 2);

        let snapshot = feed.search(ListingFilter::default(), SortKey::NewestFirst).await;
        assert_eq!(snapshot.error.as_deref(), Some(GENERIC_FETCH_ERROR));
    }

    #[test]
    fn sanitize_replaces_unreadable_and_truncates_long_messages() {
        assert_eq!(sanitize_error_message(""), GENERIC_FETCH_ERROR);
        assert_eq!(sanitize_error_message("   "), GENERIC_FETCH_ERROR);
        assert_eq!(sanitize_error_message("{\"json\":1}"), GENERIC_FETCH_ERROR);
        assert_eq!(sanitize_error_message("<html>"), GENERIC_FETCH_ERROR);
        assert_eq!(sanitize_error_message("plain failure"), "plain failure");

        let long = "x".repeat(400);
        let clipped = sanitize_error_message(&long);
        assert!(clipped.chars().count() <= MAX_ERROR_MESSAGE_CHARS + 3);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn fingerprint_distinguishes_filter_sort_and_size() {
        let base = ListingFilter::default();
        let abidjan = ListingFilter {
            city: Some("Abidjan".to_string()),
            ..Default::default()
        };
        let a = search_fingerprint(&base, SortKey::NewestFirst, 12);
        assert_ne!(a, search_fingerprint(&abidjan, SortKey::NewestFirst, 12));
        assert_ne!(a, search_fingerprint(&base, SortKey::PriceAscending, 12));
        assert_ne!(a, search_fingerprint(&base, SortKey::NewestFirst, 24));
        assert_eq!(a, search_fingerprint(&ListingFilter::default(), SortKey::NewestFirst, 12));
    }
}
