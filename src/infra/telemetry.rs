//! Tracing subscriber setup and one-time metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Installs the global tracing subscriber per the logging settings.
///
/// `RUST_LOG` directives refine the configured base level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("could not install a global subscriber: {err}"))
        })
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "kasa_cache_hit_total",
            Unit::Count,
            "Total number of query cache hits."
        );
        describe_counter!(
            "kasa_cache_miss_total",
            Unit::Count,
            "Total number of query cache misses."
        );
        describe_counter!(
            "kasa_cache_expired_total",
            Unit::Count,
            "Total number of query cache entries that expired on read."
        );
        describe_counter!(
            "kasa_cache_invalidated_total",
            Unit::Count,
            "Total number of query cache entries dropped by invalidation."
        );
        describe_counter!(
            "kasa_feed_stale_drop_total",
            Unit::Count,
            "Total number of fetched pages dropped because their search was superseded."
        );
        describe_counter!(
            "kasa_feed_end_of_data_total",
            Unit::Count,
            "Total number of page requests that ran past the end of the result set."
        );
        describe_histogram!(
            "kasa_feed_fetch_ms",
            Unit::Milliseconds,
            "Page fetch and enrichment latency in milliseconds."
        );
        describe_histogram!(
            "kasa_backend_request_ms",
            Unit::Milliseconds,
            "Listing backend HTTP request latency in milliseconds."
        );
    });
}
