//! Metrics and observability utilities
//!
//! Prometheus metrics for the HTTP surface, the generation queue, pipeline
//! stages, provider calls and publish decisions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ContentForge metrics
pub const METRICS_PREFIX: &str = "contentforge";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for provider calls and pipeline stages (LLM latency)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
    30.00,
    60.00,
    120.0,
    300.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Queue metrics
    describe_gauge!(
        format!("{}_queue_items", METRICS_PREFIX),
        Unit::Count,
        "Queue items by status"
    );

    describe_gauge!(
        format!("{}_queue_estimated_wait_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Estimated wait for a newly enqueued item"
    );

    describe_counter!(
        format!("{}_queue_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Queue item status transitions performed by the services"
    );

    // Pipeline metrics
    describe_histogram!(
        format!("{}_pipeline_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time spent in each pipeline stage"
    );

    describe_counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline runs by outcome"
    );

    describe_counter!(
        format!("{}_tokens_used_total", METRICS_PREFIX),
        Unit::Count,
        "Tokens consumed by generation calls"
    );

    // Provider metrics
    describe_counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Generation and humanization provider calls"
    );

    describe_histogram!(
        format!("{}_provider_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Provider call latency in seconds"
    );

    describe_counter!(
        format!("{}_worker_items_total", METRICS_PREFIX),
        Unit::Count,
        "Queue items processed by workers, by outcome"
    );

    // Publishing metrics
    describe_counter!(
        format!("{}_publish_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Auto-publish gate decisions"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Publish per-status queue gauges
pub fn record_queue_depth(status: &str, count: usize) {
    gauge!(
        format!("{}_queue_items", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .set(count as f64);
}

pub fn record_estimated_wait(wait_ms: u64) {
    gauge!(format!("{}_queue_estimated_wait_seconds", METRICS_PREFIX))
        .set(wait_ms as f64 / 1000.0);
}

pub fn record_queue_transition(to: &str) {
    counter!(
        format!("{}_queue_transitions_total", METRICS_PREFIX),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Helper to record time spent in one pipeline stage
pub fn record_stage(stage: &str, duration_secs: f64) {
    histogram!(
        format!("{}_pipeline_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .record(duration_secs);
}

/// `outcome` is one of `complete`, `error`, `cancelled`
pub fn record_run_outcome(outcome: &str) {
    counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_tokens(model: &str, tokens: u64) {
    counter!(
        format!("{}_tokens_used_total", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .increment(tokens);
}

/// Helper to record provider metrics
pub fn record_provider_call(provider: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_provider_duration_seconds", METRICS_PREFIX),
            "provider" => provider.to_string()
        )
        .record(duration_secs);
    }
}

/// `outcome` is one of `completed`, `failed`, `abandoned`
pub fn record_worker_outcome(outcome: &str) {
    counter!(
        format!("{}_worker_items_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// `decision` is one of `blocked`, `publish_now`, `deferred`
pub fn record_publish_decision(decision: &str) {
    counter!(
        format!("{}_publish_decisions_total", METRICS_PREFIX),
        "decision" => decision.to_string()
    )
    .increment(1);
}
