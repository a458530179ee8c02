//! Deterministic cache key construction for the listing namespace.
//!
//! Keys are stable serializations of (operation, normalized query, optional
//! id): identical requests collide, different requests never do, and every
//! listing-scoped key shares [`LISTING_NAMESPACE`] so a mutation can sweep
//! the whole namespace with one prefix invalidation.

use uuid::Uuid;

use crate::application::query::{ListingQuery, OrderBy, Predicate, format_bound};

/// Prefix shared by every listing-scoped cache key.
pub const LISTING_NAMESPACE: &str = "listings:";

const PAGE_KEY_VERSION: &str = "v1";
const DETAIL_KEY_VERSION: &str = "v1";

/// Key for one page of query results.
///
/// The query builder already normalizes filter input (trimming, lowercased
/// location needles), so equal searches map onto equal keys here.
pub fn listing_page_key(query: &ListingQuery) -> String {
    let mut key = format!(
        "{LISTING_NAMESPACE}page:{PAGE_KEY_VERSION}:{}:{}-{}",
        render_order(query.order),
        query.range.start,
        query.range.end,
    );
    for predicate in &query.predicates {
        key.push(':');
        key.push_str(&render_predicate(predicate));
    }
    key
}

/// Key for a single listing detail read.
pub fn listing_detail_key(id: Uuid) -> String {
    format!("{LISTING_NAMESPACE}detail:{DETAIL_KEY_VERSION}:{id}")
}

fn render_order(order: OrderBy) -> String {
    let direction = if order.descending { "desc" } else { "asc" };
    format!("{}.{direction}", order.column)
}

fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Eq { column, value } => format!("{column}=eq.{value}"),
        Predicate::Gte { column, value } => format!("{column}=gte.{}", format_bound(*value)),
        Predicate::Lte { column, value } => format!("{column}=lte.{}", format_bound(*value)),
        Predicate::AnyIlike { columns, needle } => {
            format!("{}=ilike.{needle}", columns.join("|"))
        }
    }
}
