//! Search filter set and sort keys applied to listing queries.

use crate::domain::types::ListingStatus;

/// The typed set of search constraints a consumer can apply.
///
/// Numeric bounds are kept as the raw strings the consumer supplied; the
/// query builder parses them and drops values that are not usable. Equality
/// of two filter sets (plus sort key and page size) decides whether a
/// pagination session has to reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListingFilter {
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_bedrooms: Option<String>,
    pub max_bedrooms: Option<String>,
    pub min_surface: Option<String>,
    pub max_surface: Option<String>,
    pub status: Option<ListingStatus>,
}

impl ListingFilter {
    /// True when no constraint is set at all.
    pub fn is_empty(&self) -> bool {
        *self == ListingFilter::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    #[default]
    NewestFirst,
    PriceAscending,
    PriceDescending,
}

impl SortKey {
    /// Maps a consumer-supplied sort parameter onto a supported key.
    ///
    /// Unknown values fall back to newest-first rather than erroring.
    pub fn from_param(value: &str) -> Self {
        match value.trim() {
            "price_asc" => SortKey::PriceAscending,
            "price_desc" => SortKey::PriceDescending,
            "newest" => SortKey::NewestFirst,
            _ => SortKey::NewestFirst,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::NewestFirst => "newest",
            SortKey::PriceAscending => "price_asc",
            SortKey::PriceDescending => "price_desc",
        }
    }
}
