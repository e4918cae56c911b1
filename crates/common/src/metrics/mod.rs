//! Metrics and observability utilities
//!
//! Prometheus metrics for the query pipeline with standardized naming.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all CampusCandid metrics
pub const METRICS_PREFIX: &str = "campuscandid";

/// Histogram buckets for end-to-end query latency (in seconds).
/// Two language-model round trips dominate, so the tail is long.
pub const QUERY_BUCKETS: &[f64] = &[
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.000,
    5.000,
    10.00,
    30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of answered or failed queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query latency in seconds"
    );

    describe_counter!(
        format!("{}_fallback_invocations_total", METRICS_PREFIX),
        Unit::Count,
        "Language-model fallback invocations by trigger"
    );

    describe_histogram!(
        format!("{}_graph_traversal_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Graph relation traversal latency in seconds"
    );

    describe_counter!(
        format!("{}_graph_records_total", METRICS_PREFIX),
        Unit::Count,
        "Records returned from graph traversals"
    );

    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Language-model requests by purpose and status"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language-model request latency in seconds"
    );

    describe_gauge!(
        format!("{}_sessions_active", METRICS_PREFIX),
        Unit::Count,
        "Sessions held in the context store"
    );

    describe_counter!(
        format!("{}_sessions_evicted_total", METRICS_PREFIX),
        Unit::Count,
        "Sessions dropped for capacity or idleness"
    );

    tracing::info!("Metrics registered");
}

/// Record a finished query
pub fn record_query(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// Record a fallback invocation
pub fn record_fallback(trigger: &str) {
    counter!(
        format!("{}_fallback_invocations_total", METRICS_PREFIX),
        "trigger" => trigger.to_string()
    )
    .increment(1);
}

/// Record one relation traversal
pub fn record_traversal(duration_secs: f64, relation: &str, records: usize) {
    histogram!(
        format!("{}_graph_traversal_duration_seconds", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .record(duration_secs);

    counter!(
        format!("{}_graph_records_total", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .increment(records as u64);
}

/// Record a language-model call
pub fn record_llm(duration_secs: f64, purpose: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "purpose" => purpose.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "purpose" => purpose.to_string()
        )
        .record(duration_secs);
    }
}

/// Record session store occupancy and evictions
pub fn record_sessions(active: usize, evicted: usize) {
    gauge!(format!("{}_sessions_active", METRICS_PREFIX)).set(active as f64);

    if evicted > 0 {
        counter!(format!("{}_sessions_evicted_total", METRICS_PREFIX)).increment(evicted as u64);
    }
}
