//! Prometheus metrics for call termination

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub const CALLS_TERMINATED: &str = "callkeeper_calls_terminated_total";
pub const CLEANUP_TIERS: &str = "callkeeper_cleanup_tier_total";
pub const CALL_DURATION: &str = "callkeeper_call_duration_seconds";
pub const PHRASES_DETECTED: &str = "callkeeper_phrases_detected_total";

/// Install the Prometheus recorder and describe every metric
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(CALL_DURATION.to_string()),
            &[5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0],
        )?
        .install_recorder()?;

    describe_metrics();
    Ok(handle)
}

pub fn describe_metrics() {
    describe_counter!(
        CALLS_TERMINATED,
        "Total number of calls terminated, by disposition"
    );
    describe_counter!(
        CLEANUP_TIERS,
        "Cleanup tier executions, by tier and outcome"
    );
    describe_histogram!(CALL_DURATION, "Call duration in seconds");
    describe_counter!(
        PHRASES_DETECTED,
        "Total number of termination phrases detected in user input"
    );
}

/// Record a termination phrase match
pub fn record_phrase_detected() {
    counter!(PHRASES_DETECTED).increment(1);
}

/// Record one cleanup tier run
pub fn record_cleanup_tier(tier: &str, outcome: &str) {
    counter!(CLEANUP_TIERS, "tier" => tier.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a finished call
pub fn record_call_terminated(disposition: &str, duration_seconds: f64) {
    counter!(CALLS_TERMINATED, "outcome" => disposition.to_string()).increment(1);
    if duration_seconds > 0.0 {
        histogram!(CALL_DURATION).record(duration_seconds);
    }
}
