//! Interface direction assignment.

use crate::context::PassContext;
use crate::model::{Direction, PeerType, SwitchStatus, UNRESOLVED_LEVEL};
use std::collections::BTreeMap;

/// Compute the direction of every interface for a switch at `level`.
///
/// Level 0 points everything south. Otherwise a link to a resolved switch
/// points toward the lower level, and a link to a machine or router points
/// south. Interfaces whose peer is not resolved keep their previous direction.
pub fn compute_directions(
    ctx: &PassContext,
    status: &SwitchStatus,
    level: u8,
) -> BTreeMap<String, Option<Direction>> {
    status
        .interfaces
        .iter()
        .map(|(name, iface)| {
            let previous = iface.direction;
            let direction = if level == UNRESOLVED_LEVEL {
                previous
            } else if level == 0 {
                Some(Direction::South)
            } else {
                match iface.peer.as_ref() {
                    Some(peer) if peer.peer_type == PeerType::Switch => peer
                        .reference
                        .as_ref()
                        .and_then(|r| ctx.find_switch(r))
                        .filter(|r| r.status.is_level_resolved())
                        .and_then(|r| {
                            let other = r.status.connection_level;
                            if other < level {
                                Some(Direction::North)
                            } else if other > level {
                                Some(Direction::South)
                            } else {
                                None
                            }
                        })
                        .or(previous),
                    Some(peer)
                        if matches!(peer.peer_type, PeerType::Machine | PeerType::Router) =>
                    {
                        Some(Direction::South)
                    }
                    _ => previous,
                }
            };
            (name.clone(), direction)
        })
        .collect()
}

/// Write computed directions into the status.
pub fn apply_directions(status: &mut SwitchStatus, directions: &BTreeMap<String, Option<Direction>>) {
    for (name, direction) in directions {
        if let Some(iface) = status.interfaces.get_mut(name) {
            iface.direction = *direction;
        }
    }
}

/// True when the stored directions already match the computed ones.
pub fn directions_match(
    status: &SwitchStatus,
    directions: &BTreeMap<String, Option<Direction>>,
) -> bool {
    directions
        .iter()
        .all(|(name, d)| status.interfaces.get(name).map(|i| i.direction) == Some(*d))
}
