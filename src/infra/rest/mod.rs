//! HTTP adapter for a PostgREST-style listing backend.
//!
//! Queries are rendered as column operator filters (`price=gte.100000`,
//! `or=(city.ilike.*abidjan*,...)`), pages are requested with `Range`
//! headers in `items` units, and exact match counts come back in the
//! `Content-Range` header. A range starting past the end of the result set
//! answers 416, which the adapter reports as the end-of-data signal.

mod listings;
mod profiles;

use std::time::{Duration, Instant};

use metrics::histogram;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::application::sources::SourceError;
use crate::config::BackendSettings;

use super::error::InfraError;

const LISTINGS_PATH: &str = "listings";
const PROFILES_PATH: &str = "profiles";

const METRIC_BACKEND_REQUEST_MS: &str = "kasa_backend_request_ms";

/// Client for the managed listing backend.
///
/// One instance serves listings, owner profiles, and mutations; it is cheap
/// to clone and safe to share.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base: Url,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, InfraError> {
        let mut headers = HeaderMap::new();
        if !settings.api_key.is_empty() {
            let api_key = HeaderValue::from_str(&settings.api_key)
                .map_err(|err| InfraError::backend(format!("invalid api key: {err}")))?;
            headers.insert("apikey", api_key);
            let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
                .map_err(|err| InfraError::backend(format!("invalid api key: {err}")))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| InfraError::backend(format!("failed to build http client: {err}")))?;

        let mut base = settings.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.base.join(path).map_err(SourceError::transport)
    }

    /// Sends a prepared request and maps the response status to the source
    /// error taxonomy. 416 is the end-of-data signal, not a fault.
    async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let started = Instant::now();
        let response = request.send().await.map_err(map_send_error)?;
        histogram!(METRIC_BACKEND_REQUEST_MS).record(started.elapsed().as_millis() as f64);

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(SourceError::RangeNotSatisfiable);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::backend(status.as_u16(), message));
        }
        Ok(response)
    }
}

fn user_agent() -> &'static str {
    concat!("kasa/", env!("CARGO_PKG_VERSION"))
}

fn map_send_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::transport(err)
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let bytes = response.bytes().await.map_err(SourceError::transport)?;
    serde_json::from_slice(&bytes).map_err(SourceError::decode)
}

/// Exact match count from a `Content-Range` header such as `0-11/3542`.
/// An unknown total (`0-11/*`) or a missing header reads as `None`.
fn exact_count_from(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(reqwest::header::CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = raw.rsplit_once('/')?;
    total.trim().parse().ok()
}
