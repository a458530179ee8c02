//! Kasa Query Cache
//!
//! One process-wide cache backs every listing read path:
//!
//! - **Page results**: enriched first-page loads, keyed by normalized query
//! - **Detail reads**: single listings, keyed by id
//!
//! Entries expire per-TTL, empty result sets are never stored, and listing
//! mutations sweep the whole `listings:` namespace by prefix.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `kasa.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_minutes = 5
//! max_entries = 256
//! ```

mod config;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::{LISTING_NAMESPACE, listing_detail_key, listing_page_key};
pub use store::QueryCache;
