use std::io;
use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr; stdout is reserved for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the cache emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "letterbox_query_cache_hit_total",
            Unit::Count,
            "Total number of observations served from a fresh cache entry."
        );
        describe_counter!(
            "letterbox_query_cache_miss_total",
            Unit::Count,
            "Total number of query fetches started."
        );
        describe_counter!(
            "letterbox_query_dedup_total",
            Unit::Count,
            "Total number of observations that joined an in-flight fetch."
        );
        describe_counter!(
            "letterbox_query_stale_discard_total",
            Unit::Count,
            "Total number of fetch results discarded because the entry changed meanwhile."
        );
        describe_histogram!(
            "letterbox_fetch_ms",
            Unit::Milliseconds,
            "API request latency in milliseconds."
        );
        describe_counter!(
            "letterbox_mutation_total",
            Unit::Count,
            "Total number of settled mutations by outcome."
        );
    });
}
