//! Structured Events
//!
//! One function per event so field names stay consistent across call sites.
//! Every event carries an `event_type` field for log-based alerting.
//!
//! Event types:
//! - `switch_status_advanced` - a pass persisted one step's increment
//! - `switch_level_resolved` - connection level changed
//! - `switch_ready` - switch reached the ready state
//! - `switch_validation_failed` - invariant violation halted a pass
//! - `configuration_liveness_failed` - configuration agent stopped reporting
//! - `prerequisite_pending` - pass made no progress while not ready

use tracing::{debug, info, warn};

pub fn switch_status_advanced(switch: &str, namespace: &str, step: &str) {
    info!(
        event_type = "switch_status_advanced",
        switch = %switch,
        namespace = %namespace,
        step = %step,
        "Switch status advanced"
    );
}

pub fn switch_level_resolved(switch: &str, previous_level: u8, new_level: u8) {
    info!(
        event_type = "switch_level_resolved",
        switch = %switch,
        previous_level = previous_level,
        new_level = new_level,
        "Switch connection level resolved"
    );
}

pub fn switch_ready(switch: &str, role: &str, level: u8, asn: u32) {
    info!(
        event_type = "switch_ready",
        switch = %switch,
        role = %role,
        level = level,
        asn = asn,
        "Switch ready"
    );
}

pub fn switch_validation_failed(switch: &str, error: &str) {
    warn!(
        event_type = "switch_validation_failed",
        switch = %switch,
        error = %error,
        "Switch validation failed"
    );
}

pub fn configuration_liveness_failed(switch: &str, last_check: &str) {
    warn!(
        event_type = "configuration_liveness_failed",
        switch = %switch,
        last_check = %last_check,
        "Configuration agent stopped reporting"
    );
}

/// Debug level: emitted on every idle pass of a switch that is still converging.
pub fn prerequisite_pending(switch: &str, waiting_on: &str) {
    debug!(
        event_type = "prerequisite_pending",
        switch = %switch,
        waiting_on = %waiting_on,
        "Waiting on prerequisite"
    );
}
