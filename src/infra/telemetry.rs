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
/// Events go to stderr so command output on stdout stays clean.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "writedesk_cache_hit_total",
            Unit::Count,
            "Session cache reads answered from the store."
        );
        describe_counter!(
            "writedesk_cache_miss_total",
            Unit::Count,
            "Session cache reads that found nothing usable."
        );
        describe_counter!(
            "writedesk_cache_evict_total",
            Unit::Count,
            "Cached posts dropped to stay within the post limit."
        );
        describe_counter!(
            "writedesk_cache_invalidation_total",
            Unit::Count,
            "Post collection invalidations published."
        );
        describe_counter!(
            "writedesk_api_request_total",
            Unit::Count,
            "Posts API responses by status code."
        );
        describe_histogram!(
            "writedesk_api_request_ms",
            Unit::Milliseconds,
            "Posts API round-trip latency in milliseconds."
        );
    });
}
