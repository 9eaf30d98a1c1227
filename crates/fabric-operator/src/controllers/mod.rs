//! Kubernetes controllers
//!
//! The switch controller is the reconciliation driver of the convergence
//! engine.

mod context;
mod status;
mod switch;

pub use crate::error::ReconcileError;
pub use context::Context;
pub use status::status_patch;
pub use switch::{log_population, reconcile_switch, PassReport, SwitchController};
