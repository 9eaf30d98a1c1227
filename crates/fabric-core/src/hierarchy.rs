//! Hierarchy resolution
//!
//! A switch's connection level is its distance from the top of the fabric.
//! Level 0 is designated externally; every other switch settles one level
//! below the shallowest resolved switch it has a link to. Because passes for
//! different switches run independently, the fabric-wide result is a
//! distributed fixpoint reached after at most "fabric depth" rounds.

use crate::context::{PassContext, SwitchRecord};
use crate::model::{SwitchStatus, UNRESOLVED_LEVEL};
use std::collections::BTreeMap;

/// Group the resolved switches of the population by connection level.
pub fn known_levels(ctx: &PassContext) -> BTreeMap<u8, Vec<&SwitchRecord>> {
    let mut levels: BTreeMap<u8, Vec<&SwitchRecord>> = BTreeMap::new();
    for record in ctx.peers() {
        if record.status.is_level_resolved() {
            levels
                .entry(record.status.connection_level)
                .or_default()
                .push(record);
        }
    }
    levels
}

/// Compute the connection level this switch should have given the snapshot.
///
/// Only levels strictly below the currently assumed one are considered, so
/// the result never moves a switch deeper into the fabric. When no linked
/// switch is resolved yet the current value (usually the sentinel) is kept.
pub fn resolve_level(ctx: &PassContext, status: &SwitchStatus) -> u8 {
    if ctx.switch.top_spine {
        return 0;
    }

    let assumed = status.connection_level;
    let known = known_levels(ctx);
    for (&level, members) in known.range(..assumed) {
        if level >= UNRESOLVED_LEVEL - 1 {
            break;
        }
        let linked = status
            .interfaces
            .values()
            .filter_map(|iface| iface.peer_switch())
            .any(|peer| members.iter().any(|m| m.matches(peer)));
        if linked {
            return level + 1;
        }
    }

    assumed
}
