//! Prometheus metrics for replay runs
//!
//! - Run counts by final status
//! - Step outcomes by kind and status
//! - Run duration
//! - Open surface sessions

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::time::Duration;

use crate::outcome::{RunResult, StepStatus};
use crate::workflow::StepKind;

lazy_static! {
    /// Replay runs by final status
    pub static ref RUNS_TOTAL: CounterVec = register_counter_vec!(
        "clickreplay_runs_total",
        "Total number of replay runs",
        &["status"]  // "ok", "invalid", "navigation", "surface", "threshold"
    )
    .unwrap();

    /// Step outcomes
    pub static ref STEPS_TOTAL: CounterVec = register_counter_vec!(
        "clickreplay_steps_total",
        "Total number of replayed steps",
        &["kind", "outcome"]  // kind: "click"/"type", outcome: "executed"/"skipped"/"failed"
    )
    .unwrap();

    /// Run duration histogram
    pub static ref RUN_DURATION_SECONDS: Histogram = register_histogram!(
        "clickreplay_run_duration_seconds",
        "Replay run duration in seconds, excluding teardown",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .unwrap();

    /// Surface sessions not yet torn down
    pub static ref ACTIVE_SESSIONS: Gauge = register_gauge!(
        "clickreplay_active_sessions",
        "Number of open surface sessions"
    )
    .unwrap();
}

/// Encode every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

/// Helper to record a workflow rejected before it ran
pub fn record_invalid_workflow() {
    RUNS_TOTAL.with_label_values(&["invalid"]).inc();
}

/// Helper to record a finished run
pub fn record_run(result: &RunResult, elapsed: Duration) {
    let status = result.failure().map(|f| f.as_str()).unwrap_or("ok");
    RUNS_TOTAL.with_label_values(&[status]).inc();
    RUN_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

/// Helper to record one step outcome
pub fn record_step(kind: StepKind, outcome: &StepStatus) {
    STEPS_TOTAL
        .with_label_values(&[kind.as_str(), outcome.label()])
        .inc();
}

/// Helper to record session opened
pub fn record_session_opened() {
    ACTIVE_SESSIONS.inc();
}

/// Helper to record session closed
pub fn record_session_closed() {
    ACTIVE_SESSIONS.dec();
}
