//! Prometheus metrics & middleware helper.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge, Opts};

/// Global Prometheus handle reused in tests.
pub static METRICS: Lazy<PrometheusMetrics> = Lazy::new(|| {
    PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics") // exposed URL
        .build()
        .expect("metrics builder")
});

/// Rooms currently held by the registry.
pub static ACTIVE_ROOMS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("lobby_active_rooms", "Rooms currently open").expect("gauge opts");
    if let Err(e) = METRICS.registry.register(Box::new(gauge.clone())) {
        log::warn!("could not register lobby_active_rooms: {e}");
    }
    gauge
});

/// Finished room executions by outcome (completed / failed / stopped / panicked).
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("lobby_pipeline_runs_total", "Room executions by outcome"),
        &["outcome"],
    )
    .expect("counter opts");
    if let Err(e) = METRICS.registry.register(Box::new(counter.clone())) {
        log::warn!("could not register lobby_pipeline_runs_total: {e}");
    }
    counter
});
