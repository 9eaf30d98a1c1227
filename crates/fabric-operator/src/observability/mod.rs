//! Observability
//!
//! - `events`: structured event logging with consistent fields
//! - `metrics`: Prometheus metrics for reconcile passes and switch states
//! - `tracing`: subscriber setup with optional OTLP export

pub mod events;
pub mod metrics;
pub mod tracing;

pub use metrics::{init_metrics, MetricsState};
pub use self::tracing::{init_tracing, shutdown_tracing, TracingConfig};
