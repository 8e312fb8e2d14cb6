// Metric names and help text are static, construction cannot fail at runtime.
#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Video Wall Metrics ====
    pub static ref WALL_ACTIVE_SESSIONS: IntGauge = {
        let metric = IntGauge::new(
            "video_wall_active_sessions",
            "Number of stream sessions bound to a grid slot",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref WALL_GRID_SIZE: IntGauge = {
        let metric = IntGauge::new("video_wall_grid_size", "Current number of grid slots")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref WALL_CONNECT_ATTEMPTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "video_wall_connect_attempts_total",
                "Total number of stream connect attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref WALL_STALE_COMPLETIONS: IntCounter = {
        let metric = IntCounter::new(
            "video_wall_stale_completions_total",
            "Connect completions discarded because the session was superseded",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref WALL_SLOT_CHANGES: IntCounter = {
        let metric = IntCounter::new(
            "video_wall_slot_changes_total",
            "Total number of slot assignment changes",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref WALL_CONNECT_DURATION: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "video_wall_connect_duration_seconds",
                "Time from connect request to connected or failed",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics for Prometheus scraping
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
