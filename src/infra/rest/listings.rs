//! Listing reads and mutations against the REST backend.

use async_trait::async_trait;
use reqwest::header::RANGE;
use tracing::debug;
use uuid::Uuid;

use crate::application::query::{ListingQuery, Predicate, format_bound};
use crate::application::sources::{
    CreateListingParams, ListingSource, ListingWriteSource, QueryPage, SourceError,
    UpdateListingParams,
};
use crate::domain::listings::ListingRecord;

use super::{LISTINGS_PATH, RestBackend, decode_json, exact_count_from};

/// Renders a built query as PostgREST-style filter parameters.
fn query_params(query: &ListingQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    for predicate in &query.predicates {
        match predicate {
            Predicate::Eq { column, value } => {
                params.push(((*column).to_string(), format!("eq.{value}")));
            }
            Predicate::Gte { column, value } => {
                params.push(((*column).to_string(), format!("gte.{}", format_bound(*value))));
            }
            Predicate::Lte { column, value } => {
                params.push(((*column).to_string(), format!("lte.{}", format_bound(*value))));
            }
            Predicate::AnyIlike { columns, needle } => {
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|column| format!("{column}.ilike.*{needle}*"))
                    .collect();
                params.push(("or".to_string(), format!("({})", clauses.join(","))));
            }
        }
    }
    let direction = if query.order.descending { "desc" } else { "asc" };
    params.push(("order".to_string(), format!("{}.{direction}", query.order.column)));
    params
}

#[async_trait]
impl ListingSource for RestBackend {
    async fn fetch_page(&self, query: &ListingQuery) -> Result<QueryPage, SourceError> {
        let request = self
            .client
            .get(self.endpoint(LISTINGS_PATH)?)
            .query(&query_params(query))
            .header("Range-Unit", "items")
            .header(RANGE, format!("{}-{}", query.range.start, query.range.end))
            .header("Prefer", "count=exact");

        let response = self.send(request).await?;
        let exact_count = exact_count_from(response.headers());
        let items: Vec<ListingRecord> = decode_json(response).await?;
        debug!(
            rows = items.len(),
            exact_count, "fetched listing page from backend"
        );
        Ok(QueryPage { items, exact_count })
    }

    async fn fetch_listing(&self, id: Uuid) -> Result<Option<ListingRecord>, SourceError> {
        let request = self
            .client
            .get(self.endpoint(LISTINGS_PATH)?)
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("eq.{id}")),
                ("limit", "1".to_string()),
            ]);

        let response = self.send(request).await?;
        let mut rows: Vec<ListingRecord> = decode_json(response).await?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl ListingWriteSource for RestBackend {
    async fn create_listing(
        &self,
        params: CreateListingParams,
    ) -> Result<ListingRecord, SourceError> {
        let request = self
            .client
            .post(self.endpoint(LISTINGS_PATH)?)
            .query(&[("select", "*")])
            .header("Prefer", "return=representation")
            .json(&params);

        let response = self.send(request).await?;
        let mut rows: Vec<ListingRecord> = decode_json(response).await?;
        rows.pop()
            .ok_or_else(|| SourceError::decode("create returned no representation"))
    }

    async fn update_listing(
        &self,
        id: Uuid,
        params: UpdateListingParams,
    ) -> Result<ListingRecord, SourceError> {
        let request = self
            .client
            .patch(self.endpoint(LISTINGS_PATH)?)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&params);

        let response = self.send(request).await?;
        let mut rows: Vec<ListingRecord> = decode_json(response).await?;
        rows.pop()
            .ok_or_else(|| SourceError::backend(404, "listing not found"))
    }

    async fn delete_listing(&self, id: Uuid) -> Result<(), SourceError> {
        let request = self
            .client
            .delete(self.endpoint(LISTINGS_PATH)?)
            .query(&[("id", format!("eq.{id}"))]);

        self.send(request).await?;
        Ok(())
    }
}
