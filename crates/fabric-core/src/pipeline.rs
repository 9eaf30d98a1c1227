//! Convergence pipeline
//!
//! A pass walks an ordered list of steps against a working copy of the
//! status. Satisfied steps are skipped; the first unsatisfied step advances.
//! If that changed the status, the pass stops and the caller persists the
//! result; later steps run on the next pass. A step that could not make
//! progress (missing prerequisite) leaves the status alone and the walk
//! continues. At most one increment is persisted per pass.

use crate::context::PassContext;
use crate::error::FabricError;
use crate::model::SwitchStatus;
use std::time::Duration;
use tracing::{debug, trace};

/// One idempotent increment of the convergence state machine.
pub trait Step: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool;

    /// Move the status forward. Must be safe to call again from scratch.
    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError>;
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// `step` produced a new status that must be persisted.
    Changed {
        step: &'static str,
        status: SwitchStatus,
    },
    /// Nothing to persist; every step is satisfied or waiting on prerequisites.
    Unchanged,
}

impl PassOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, PassOutcome::Changed { .. })
    }
}

/// Ordered, statically defined sequence of steps.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run one pass over `current`. The input is never modified; on error the
    /// previously persisted status remains authoritative.
    pub fn run_pass(
        &self,
        ctx: &PassContext,
        current: &SwitchStatus,
    ) -> Result<PassOutcome, FabricError> {
        let mut working = current.clone();

        for step in &self.steps {
            if step.is_satisfied(ctx, &working) {
                trace!(step = step.name(), "step satisfied");
                continue;
            }

            step.advance(ctx, &mut working)?;

            if working != *current {
                debug!(step = step.name(), switch = %ctx.switch.name, "step advanced status");
                return Ok(PassOutcome::Changed {
                    step: step.name(),
                    status: working,
                });
            }
            debug!(step = step.name(), switch = %ctx.switch.name, "step waiting on prerequisites");
        }

        Ok(PassOutcome::Unchanged)
    }
}

/// When to look at a switch again after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequeuePolicy {
    /// After a persisted change, so the next increment follows quickly.
    pub change_requeue: Duration,
    /// Not ready and nothing changed: re-check external prerequisites.
    pub retry_interval: Duration,
    /// Ready and managed: periodic configuration liveness check.
    pub liveness_interval: Duration,
    /// Ready and unmanaged: slow resync.
    pub resync_interval: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            change_requeue: Duration::from_secs(1),
            retry_interval: Duration::from_secs(30),
            liveness_interval: Duration::from_secs(60),
            resync_interval: Duration::from_secs(300),
        }
    }
}

impl RequeuePolicy {
    /// Delay before the next pass given this pass's outcome and the status
    /// that is now persisted.
    pub fn next(&self, outcome: &PassOutcome, status: &SwitchStatus) -> Duration {
        if outcome.is_changed() {
            self.change_requeue
        } else if !status.is_ready() {
            self.retry_interval
        } else if status.configuration.managed {
            self.liveness_interval
        } else {
            self.resync_interval
        }
    }
}
