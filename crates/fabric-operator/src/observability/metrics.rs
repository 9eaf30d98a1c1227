//! Prometheus Metrics
//!
//! Metrics tracked:
//! - `fabric_reconcile_total` - counter of reconcile passes by outcome
//! - `fabric_reconcile_duration_seconds` - histogram of pass durations
//! - `fabric_step_advanced_total` - counter of persisted increments by step
//! - `fabric_switches_by_state` - gauge of switches by convergence state

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

#[derive(Clone)]
pub struct MetricsState {
    pub prometheus_handle: PrometheusHandle,
}

/// Install the global Prometheus recorder and register descriptions.
pub fn init_metrics() -> Result<MetricsState, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metric_descriptions();

    Ok(MetricsState {
        prometheus_handle: handle,
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "fabric_reconcile_total",
        "Total number of switch reconcile passes by outcome"
    );
    describe_histogram!(
        "fabric_reconcile_duration_seconds",
        "Duration of a switch reconcile pass in seconds"
    );
    describe_counter!(
        "fabric_step_advanced_total",
        "Total number of persisted status increments by step"
    );
    describe_gauge!(
        "fabric_switches_by_state",
        "Number of switches by convergence state"
    );
}

/// `outcome` is `changed`, `unchanged` or an error kind.
pub fn record_reconcile(outcome: &str, duration: Duration) {
    counter!("fabric_reconcile_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("fabric_reconcile_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_step_advanced(step: &str) {
    counter!("fabric_step_advanced_total", "step" => step.to_string()).increment(1);
}

pub fn set_switches_by_state(state: &str, count: usize) {
    gauge!("fabric_switches_by_state", "state" => state.to_string()).set(count as f64);
}
