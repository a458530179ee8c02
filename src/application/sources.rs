//! Source traits describing the managed listing backend.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::query::ListingQuery;
use crate::domain::listings::ListingRecord;
use crate::domain::profiles::OwnerProfile;
use crate::domain::types::ListingStatus;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested row range starts beyond the end of the result set.
    ///
    /// End-of-data signal (HTTP 416 on REST backends), not a fault.
    #[error("requested range not satisfiable")]
    RangeNotSatisfiable,
    #[error("backend error (status {status}): {message}")]
    Backend { status: u16, message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("malformed backend payload: {message}")]
    Decode { message: String },
    #[error("backend timeout")]
    Timeout,
}

impl SourceError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }

    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::RangeNotSatisfiable)
    }
}

/// One fetched page plus the exact match count when the backend supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub items: Vec<ListingRecord>,
    pub exact_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateListingParams {
    pub title: String,
    pub city: String,
    pub neighborhood: Option<String>,
    pub property_type: String,
    pub price: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub surface_area: Option<f64>,
    pub status: ListingStatus,
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub owner_id: Option<Uuid>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateListingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetches one page of listings matching `query`.
    ///
    /// A range starting beyond the end of the result set must surface as
    /// [`SourceError::RangeNotSatisfiable`], distinguishably from faults.
    async fn fetch_page(&self, query: &ListingQuery) -> Result<QueryPage, SourceError>;

    async fn fetch_listing(&self, id: Uuid) -> Result<Option<ListingRecord>, SourceError>;
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Batched profile lookup; ids with no public profile are simply absent
    /// from the result, never errors.
    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OwnerProfile>, SourceError>;
}

#[async_trait]
pub trait ListingWriteSource: Send + Sync {
    async fn create_listing(
        &self,
        params: CreateListingParams,
    ) -> Result<ListingRecord, SourceError>;

    async fn update_listing(
        &self,
        id: Uuid,
        params: UpdateListingParams,
    ) -> Result<ListingRecord, SourceError>;

    async fn delete_listing(&self, id: Uuid) -> Result<(), SourceError>;
}
