//! Prometheus metrics for the cask server.
//!
//! Counts publications, rejections by error code, feed generations and key
//! generation, and times the publish pipeline.
//!
//! The `/metrics` endpoint is unauthenticated. Restrict it at the network
//! level when the service is reachable from untrusted clients.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static PACKAGES_PUBLISHED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cask_packages_published_total",
        "Total number of packages published",
    )
    .expect("metric creation failed")
});

pub static PUBLISH_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cask_publish_rejections_total",
            "Total rejected uploads by error code",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static FEED_GENERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cask_feed_generations_total",
            "Total update feed generations by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static KEYS_GENERATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cask_keys_generated_total",
        "Total number of application signing keys generated",
    )
    .expect("metric creation failed")
});

pub static PACKAGE_DOWNLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cask_package_downloads_total",
        "Total number of package downloads served",
    )
    .expect("metric creation failed")
});

pub static PUBLISH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "cask_publish_duration_seconds",
            "Time taken to build, sign and store an uploaded package",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(PACKAGES_PUBLISHED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUBLISH_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FEED_GENERATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(KEYS_GENERATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGE_DOWNLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUBLISH_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a rejected upload by error code.
pub fn record_publish_rejection(reason: &str) {
    PUBLISH_REJECTIONS.with_label_values(&[reason]).inc();
}

/// Record the outcome of a feed generation.
pub fn record_feed_generation(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    FEED_GENERATIONS.with_label_values(&[outcome]).inc();
}
