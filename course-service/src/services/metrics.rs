//! Prometheus metrics for course-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Generation steps by provider and outcome (`success`, `error`).
pub static GENERATION_STEPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "course_generation_steps_total",
        "Total number of AI generation steps",
        &["provider", "status"]
    )
    .expect("Failed to register generation_steps_total")
});

/// Orchestrated runs by terminal state (`finished`, `aborted`).
pub static GENERATION_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "course_generation_runs_total",
        "Total number of AI generation runs",
        &["status"]
    )
    .expect("Failed to register generation_runs_total")
});

/// Provider round-trip latency.
pub static PROVIDER_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "course_provider_call_duration_seconds",
        "AI provider call duration in seconds",
        &["provider"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register provider_call_duration")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "course_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&GENERATION_STEPS_TOTAL);
    Lazy::force(&GENERATION_RUNS_TOTAL);
    Lazy::force(&PROVIDER_CALL_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
