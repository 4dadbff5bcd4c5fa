//! Fault-subsystem observability metrics
//!
//! Prometheus-compatible metrics covering:
//! - Symptom reports and status transitions
//! - Recovery attempts, outcomes, and durations
//! - Recovery phase transitions and lifecycle events
//! - Tracker drain waits
//! - Listener panics

use std::time::Duration;

/// Record a reported symptom
pub fn record_symptom(kind: &str) {
    metrics::counter!(
        "tetramesh_fault_symptoms_total",
        "kind" => kind.to_string(),
    )
    .increment(1);
}

/// Record a partition status transition
pub fn record_status_transition(from: &'static str, to: &'static str) {
    metrics::counter!(
        "tetramesh_partition_transitions_total",
        "from" => from,
        "to" => to,
    )
    .increment(1);
}

/// Record the latency between suspicion and confirmed failure
pub fn record_detection_latency(latency: Duration) {
    metrics::histogram!("tetramesh_fault_detection_latency_seconds")
        .record(latency.as_secs_f64());
}

/// Record a recovery attempt starting
pub fn record_recovery_started(strategy: &str) {
    metrics::counter!(
        "tetramesh_recovery_attempts_total",
        "strategy" => strategy.to_string(),
    )
    .increment(1);
}

/// Record a recovery attempt finishing
pub fn record_recovery_completed(success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    metrics::counter!(
        "tetramesh_recovery_completed_total",
        "status" => status,
    )
    .increment(1);

    metrics::histogram!("tetramesh_recovery_duration_seconds").record(duration.as_secs_f64());
}

/// Record a recovery phase transition
pub fn record_phase_transition(phase: &'static str) {
    metrics::counter!(
        "tetramesh_recovery_phase_transitions_total",
        "phase" => phase,
    )
    .increment(1);
}

/// Record a recovery lifecycle event
pub fn record_recovery_event(event_type: &'static str) {
    metrics::counter!(
        "tetramesh_recovery_events_total",
        "type" => event_type,
    )
    .increment(1);
}

/// Record a tracker drain wait
pub fn record_drain_wait(drained: bool, waited: Duration) {
    let status = if drained { "drained" } else { "timeout" };
    metrics::counter!(
        "tetramesh_tracker_drains_total",
        "status" => status,
    )
    .increment(1);

    metrics::histogram!("tetramesh_tracker_drain_wait_seconds").record(waited.as_secs_f64());
}

/// Record an operation rejected because the tracker is paused
pub fn record_operation_rejected() {
    metrics::counter!("tetramesh_tracker_rejected_operations_total").increment(1);
}

/// Record a panicking listener or observer callback
pub fn record_listener_panic() {
    metrics::counter!("tetramesh_listener_panics_total").increment(1);
}
