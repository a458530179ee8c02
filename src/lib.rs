//! Kasa listing discovery engine.
//!
//! The crate turns user-supplied search filters into correctly ordered,
//! incrementally loaded, cached, and owner-enriched listing pages:
//!
//! - [`application::query`] builds typed backend queries from a filter set.
//! - [`cache`] holds the process-wide TTL query cache with prefix
//!   invalidation.
//! - [`application::enrichment`] decorates listing pages with batched owner
//!   profile lookups.
//! - [`application::feed`] is the pagination controller: single-flight
//!   fetches, stale-response rejection, and end-of-data tracking.
//! - [`infra::rest`] adapts the whole thing to the managed REST backend.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
