//! Pure construction of backend listing queries from a filter set.
//!
//! The output is a typed query value; backends interpret it (the REST
//! adapter renders it into request parameters, test doubles evaluate it in
//! memory). Building a query never fails: unusable filter input is dropped
//! per the leniency policy rather than reported.

use crate::domain::filters::{ListingFilter, SortKey};

pub const COL_CITY: &str = "city";
pub const COL_NEIGHBORHOOD: &str = "neighborhood";
pub const COL_PROPERTY_TYPE: &str = "property_type";
pub const COL_PRICE: &str = "price";
pub const COL_BEDROOMS: &str = "bedrooms";
pub const COL_SURFACE_AREA: &str = "surface_area";
pub const COL_STATUS: &str = "status";
pub const COL_CREATED_AT: &str = "created_at";

/// Columns searched by the free-text location filter.
pub const LOCATION_COLUMNS: &[&str] = &[COL_CITY, COL_NEIGHBORHOOD];

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match on a column's wire value.
    Eq { column: &'static str, value: String },
    /// Inclusive lower bound on a numeric column.
    Gte { column: &'static str, value: f64 },
    /// Inclusive upper bound on a numeric column.
    Lte { column: &'static str, value: f64 },
    /// Case-insensitive substring match over any of the columns.
    ///
    /// The needle is stored lowercased so equal searches produce equal
    /// queries regardless of input casing.
    AnyIlike {
        columns: &'static [&'static str],
        needle: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

/// Inclusive row range `[start, end]`, matching range-based backend
/// pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: u64,
    pub end: u64,
}

impl RowRange {
    /// Window for `page` with `page_size` rows: `[page*size, (page+1)*size - 1]`.
    pub fn page(page: u32, page_size: u32) -> Self {
        let size = u64::from(page_size.max(1));
        let start = u64::from(page) * size;
        Self {
            start,
            end: start + size - 1,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub predicates: Vec<Predicate>,
    pub order: OrderBy,
    pub range: RowRange,
}

impl ListingQuery {
    /// Builds the query for one page of results under `filter` and `sort`.
    ///
    /// Filters apply only when present and non-empty after trimming. Numeric
    /// input that does not parse, or parses negative, is ignored.
    pub fn build(filter: &ListingFilter, sort: SortKey, page: u32, page_size: u32) -> Self {
        let mut predicates = Vec::new();

        if let Some(city) = non_empty(&filter.city) {
            predicates.push(Predicate::AnyIlike {
                columns: LOCATION_COLUMNS,
                needle: city.to_lowercase(),
            });
        }
        if let Some(property_type) = non_empty(&filter.property_type) {
            predicates.push(Predicate::Eq {
                column: COL_PROPERTY_TYPE,
                value: property_type.to_string(),
            });
        }
        if let Some(min_price) = parse_bound(&filter.min_price) {
            predicates.push(Predicate::Gte {
                column: COL_PRICE,
                value: min_price,
            });
        }
        if let Some(max_price) = parse_bound(&filter.max_price) {
            predicates.push(Predicate::Lte {
                column: COL_PRICE,
                value: max_price,
            });
        }
        if let Some(min_bedrooms) = parse_count(&filter.min_bedrooms) {
            predicates.push(Predicate::Gte {
                column: COL_BEDROOMS,
                value: f64::from(min_bedrooms),
            });
        }
        if let Some(max_bedrooms) = parse_count(&filter.max_bedrooms) {
            predicates.push(Predicate::Lte {
                column: COL_BEDROOMS,
                value: f64::from(max_bedrooms),
            });
        }
        if let Some(min_surface) = parse_bound(&filter.min_surface) {
            predicates.push(Predicate::Gte {
                column: COL_SURFACE_AREA,
                value: min_surface,
            });
        }
        if let Some(max_surface) = parse_bound(&filter.max_surface) {
            predicates.push(Predicate::Lte {
                column: COL_SURFACE_AREA,
                value: max_surface,
            });
        }
        if let Some(status) = filter.status {
            predicates.push(Predicate::Eq {
                column: COL_STATUS,
                value: status.as_str().to_string(),
            });
        }

        let order = match sort {
            SortKey::NewestFirst => OrderBy {
                column: COL_CREATED_AT,
                descending: true,
            },
            SortKey::PriceAscending => OrderBy {
                column: COL_PRICE,
                descending: false,
            },
            SortKey::PriceDescending => OrderBy {
                column: COL_PRICE,
                descending: true,
            },
        };

        Self {
            predicates,
            order,
            range: RowRange::page(page, page_size),
        }
    }
}

/// Renders a numeric bound without a trailing `.0`, so queries and cache
/// keys agree on one textual form.
pub fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
}

fn parse_bound(value: &Option<String>) -> Option<f64> {
    let parsed: f64 = non_empty(value)?.parse().ok()?;
    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

fn parse_count(value: &Option<String>) -> Option<u32> {
    non_empty(value)?.parse().ok()
}
