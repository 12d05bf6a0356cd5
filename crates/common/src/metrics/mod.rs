//! Metrics and observability utilities
//!
//! Prometheus-style metrics for each pipeline stage with standardized
//! naming. The exporter itself is installed by the gateway binary.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all Pestwise metrics
pub const METRICS_PREFIX: &str = "pestwise";

/// Histogram buckets for stage latency (in seconds).
/// Knowledge lookups sit in the low buckets, generation in the high ones.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.0005, // 0.5ms
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_stage_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline stage executions by component, operation and status"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline stage latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_total", METRICS_PREFIX),
        Unit::Count,
        "Generation backend calls by model, intent and status"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation latency in seconds"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Answers returned by source tag"
    );

    tracing::info!("Metrics registered");
}

fn status(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

/// Helper to record stage metrics
pub fn record_stage(component: &str, operation: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_stage_total", METRICS_PREFIX),
        "component" => component.to_string(),
        "operation" => operation.to_string(),
        "status" => status(success)
    )
    .increment(1);

    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Helper to record generation metrics
pub fn record_generation(duration_secs: f64, model: &str, intent: &str, success: bool) {
    counter!(
        format!("{}_generation_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "intent" => intent.to_string(),
        "status" => status(success)
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record the source tag of a returned answer
pub fn record_answer(source: &str) {
    counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}
