//! Status patch construction
//!
//! Statuses are written as JSON merge patches. Under merge semantics an
//! absent key means "leave as is", so every key present in the stored status
//! but gone from the new one is sent as an explicit `null`.

use crate::crds::Switch;
use fabric_core::SwitchStatus;
use kube::ResourceExt;
use serde_json::{json, Value};

/// Insert `null` into `next` for every key of `previous` it no longer has.
fn null_removed(previous: &Value, next: &mut Value) {
    let (Value::Object(old), Value::Object(new)) = (previous, next) else {
        return;
    };
    for (key, old_value) in old {
        match new.get_mut(key) {
            Some(new_value) => null_removed(old_value, new_value),
            None => {
                new.insert(key.clone(), Value::Null);
            }
        }
    }
}

/// Merge patch moving `switch`'s stored status to `status`, guarded by the
/// resource version the pass was computed from.
pub fn status_patch(switch: &Switch, status: &SwitchStatus) -> Result<Value, serde_json::Error> {
    let mut next = serde_json::to_value(status)?;
    if let Some(previous) = &switch.status {
        null_removed(&serde_json::to_value(previous)?, &mut next);
    }
    Ok(json!({
        "metadata": { "resourceVersion": switch.resource_version() },
        "status": next,
    }))
}
