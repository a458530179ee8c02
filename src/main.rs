use std::process;
use std::sync::Arc;

use kasa::{
    application::{
        catalog::CatalogService,
        enrichment::EnrichmentService,
        feed::{FeedPhase, FeedSnapshot, ListingFeed},
        sources::{ListingSource, ListingWriteSource, ProfileSource, SourceError},
    },
    cache::{CacheConfig, QueryCache},
    config,
    domain::filters::{ListingFilter, SortKey},
    domain::listings::EnrichedListing,
    domain::types::ListingStatus,
    infra::{error::InfraError, rest::RestBackend, telemetry},
};
use thiserror::Error;
use tracing::{Dispatch, Level, debug, dispatcher, error, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[derive(Debug, Error)]
enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("backend error: {0}")]
    Source(#[from] SourceError),
    #[error("search failed: {0}")]
    Search(String),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Search(Box::<config::SearchArgs>::default()));

    telemetry::init(&settings.logging)?;

    let services = build_services(&settings)?;

    match command {
        config::Command::Search(args) => run_search(&services, *args).await,
        config::Command::Listing(args) => run_listing(&services, args).await,
    }
}

struct Services {
    feed: ListingFeed,
    catalog: CatalogService,
}

fn build_services(settings: &config::Settings) -> Result<Services, AppError> {
    let backend = Arc::new(RestBackend::new(&settings.backend)?);
    let listings: Arc<dyn ListingSource> = backend.clone();
    let profiles: Arc<dyn ProfileSource> = backend.clone();
    let writes: Arc<dyn ListingWriteSource> = backend;

    let cache = Arc::new(QueryCache::new(CacheConfig::from(&settings.cache)));
    let enrichment = EnrichmentService::new(profiles);
    debug!(
        backend = %settings.backend.base_url,
        cache_enabled = cache.is_enabled(),
        page_size = settings.discovery.page_size,
        "services ready"
    );

    let feed = ListingFeed::new(
        listings.clone(),
        enrichment.clone(),
        cache.clone(),
        settings.discovery.page_size,
    );
    let catalog = CatalogService::new(listings, writes, enrichment, cache);

    Ok(Services { feed, catalog })
}

async fn run_search(services: &Services, args: config::SearchArgs) -> Result<(), AppError> {
    let filter = filter_from_args(&args);
    let sort = args
        .sort
        .as_deref()
        .map(SortKey::from_param)
        .unwrap_or_default();
    debug!(
        sort = sort.as_str(),
        filtered = !filter.is_empty(),
        pages = args.pages.max(1),
        "searching listings"
    );

    let mut snapshot = services.feed.search(filter, sort).await;
    let mut fetched_pages = 1;
    while fetched_pages < args.pages.max(1) && snapshot.has_more && snapshot.error.is_none() {
        snapshot = services.feed.load_more().await;
        fetched_pages += 1;
    }

    if snapshot.phase == FeedPhase::Failed {
        return Err(AppError::Search(
            snapshot.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot.items)?);
    } else {
        print_listing_table(&snapshot);
    }

    if let Some(message) = snapshot.error {
        warn!(error = %message, "search finished with a partial failure");
        eprintln!("warning: {message}");
    }
    Ok(())
}

async fn run_listing(services: &Services, args: config::ListingArgs) -> Result<(), AppError> {
    match services.catalog.listing(args.id).await? {
        Some(detail) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print_listing_detail(&detail);
            }
        }
        None => println!("listing {} not found", args.id),
    }
    Ok(())
}

fn filter_from_args(args: &config::SearchArgs) -> ListingFilter {
    let status = args.status.as_deref().and_then(|value| {
        match ListingStatus::try_from(value) {
            Ok(status) => Some(status),
            Err(()) => {
                warn!(status = value, "ignoring unknown status filter");
                None
            }
        }
    });

    ListingFilter {
        city: args.city.clone(),
        property_type: args.property_type.clone(),
        min_price: args.min_price.clone(),
        max_price: args.max_price.clone(),
        min_bedrooms: args.min_bedrooms.clone(),
        max_bedrooms: args.max_bedrooms.clone(),
        min_surface: args.min_surface.clone(),
        max_surface: args.max_surface.clone(),
        status,
    }
}

fn print_listing_table(snapshot: &FeedSnapshot) {
    if snapshot.items.is_empty() {
        println!("no listings matched");
        return;
    }

    for item in &snapshot.items {
        let listing = &item.listing;
        let location = match listing.neighborhood.as_deref() {
            Some(neighborhood) => format!("{neighborhood}, {}", listing.city),
            None => listing.city.clone(),
        };
        println!(
            "{}  {:<32}  {:<28}  {:>12.0}  {}bd/{}ba  {}",
            listing.id,
            truncate(&listing.title, 32),
            truncate(&location, 28),
            listing.price,
            listing.bedrooms,
            listing.bathrooms,
            item.owner_display_name.as_deref().unwrap_or("-"),
        );
    }

    let more = if snapshot.has_more {
        " (more available)"
    } else {
        ""
    };
    println!();
    println!(
        "{} of {} listings loaded{more}",
        snapshot.items.len(),
        snapshot.total_count
    );
}

fn print_listing_detail(detail: &EnrichedListing) {
    let listing = &detail.listing;
    println!("{}", listing.title);
    println!("  id:        {}", listing.id);
    match listing.neighborhood.as_deref() {
        Some(neighborhood) => println!("  location:  {neighborhood}, {}", listing.city),
        None => println!("  location:  {}", listing.city),
    }
    println!("  type:      {}", listing.property_type);
    println!("  status:    {}", listing.status.as_str());
    println!("  price:     {:.0}", listing.price);
    println!(
        "  rooms:     {} bedrooms, {} bathrooms",
        listing.bedrooms, listing.bathrooms
    );
    if let Some(surface) = listing.surface_area {
        println!("  surface:   {surface} m2");
    }
    if let Some(owner) = detail.owner_display_name.as_deref() {
        let verified = match (detail.owner_identity_verified, detail.owner_phone_verified) {
            (Some(true), Some(true)) => " (identity and phone verified)",
            (Some(true), _) => " (identity verified)",
            (_, Some(true)) => " (phone verified)",
            _ => "",
        };
        println!("  owner:     {owner}{verified}");
    }
    if let Some(score) = detail.owner_trust_score {
        println!("  trust:     {score:.0}/100");
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}
