//! Topology steps: interfaces, peers, connection level, role and directions.

use crate::addressing::port_index;
use crate::context::PassContext;
use crate::direction::{apply_directions, compute_directions, directions_match};
use crate::error::FabricError;
use crate::hierarchy::resolve_level;
use crate::model::{
    ConfigState, InterfaceStatus, Nic, PeerType, ResourceRef, SwitchState, SwitchStatus,
    UNRESOLVED_LEVEL,
};
use crate::pipeline::Step;
use crate::role::{check_role, compute_role};
use std::collections::BTreeMap;
use tracing::{debug, info};

fn reported_interfaces(nics: &[Nic]) -> BTreeMap<String, InterfaceStatus> {
    nics.iter()
        .filter(|nic| port_index(&nic.name).is_some())
        .map(|nic| (nic.name.clone(), InterfaceStatus::from_nic(nic)))
        .collect()
}

/// Rebuild the interface map from the reported neighbor facts.
///
/// Interfaces whose neighbor is unchanged keep their derived data. When the
/// set of interfaces or any neighbor changed, the hierarchy is re-validated
/// from scratch: the level goes back to unresolved and the state to initial.
/// A managed switch is also handed back to the configuration agent once it is
/// ready again.
pub struct SyncInterfaces;

impl Step for SyncInterfaces {
    fn name(&self) -> &'static str {
        "sync-interfaces"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        let Some(nics) = ctx.nics.as_deref() else {
            return true;
        };
        let reported = reported_interfaces(nics);
        status.total_ports as usize == reported.len()
            && status.interfaces.len() == reported.len()
            && reported.iter().all(|(name, fresh)| {
                status
                    .interfaces
                    .get(name)
                    .is_some_and(|stored| stored.same_facts(fresh) && stored.same_peer(fresh))
            })
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        let Some(nics) = ctx.nics.as_deref() else {
            return Ok(());
        };
        let reported = reported_interfaces(nics);

        let diverged = status.interfaces.len() != reported.len()
            || reported.iter().any(|(name, fresh)| {
                status
                    .interfaces
                    .get(name)
                    .map_or(true, |stored| !stored.same_peer(fresh))
            });
        let had_interfaces = !status.interfaces.is_empty();

        let mut merged = BTreeMap::new();
        for (name, fresh) in reported {
            let iface = match status.interfaces.remove(&name) {
                Some(mut stored) if stored.same_peer(&fresh) => {
                    stored.mac = fresh.mac;
                    stored.fec = fresh.fec;
                    stored.mtu = fresh.mtu;
                    stored.speed = fresh.speed;
                    stored.lanes = fresh.lanes;
                    stored.state = fresh.state;
                    stored
                }
                _ => fresh,
            };
            merged.insert(name, iface);
        }
        status.total_ports = merged.len() as u32;
        status.interfaces = merged;

        if diverged {
            status.role = None;
            if had_interfaces {
                info!(switch = %ctx.switch.name, "interface facts diverged, re-validating hierarchy");
                status.connection_level = UNRESOLVED_LEVEL;
                status.state = Some(SwitchState::Initial);
                if status.configuration.managed {
                    status.configuration.state = ConfigState::Initial;
                }
            }
        }
        Ok(())
    }
}

fn resolve_peer(ctx: &PassContext, interface: &str, chassis_id: &str) -> (PeerType, Option<ResourceRef>) {
    match ctx.find_by_chassis(chassis_id) {
        Some(record) => (PeerType::Switch, Some(record.reference())),
        None => (
            PeerType::from_capabilities(ctx.peer_capabilities(interface)),
            None,
        ),
    }
}

fn switch_ports(status: &SwitchStatus) -> u32 {
    status
        .interfaces
        .values()
        .filter(|iface| iface.peer.as_ref().is_some_and(|p| p.peer_type == PeerType::Switch))
        .count() as u32
}

/// Classify each neighbor and link it to its switch record by chassis id.
pub struct ResolvePeers;

impl Step for ResolvePeers {
    fn name(&self) -> &'static str {
        "resolve-peers"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        status.switch_ports == switch_ports(status)
            && status.interfaces.iter().all(|(name, iface)| match &iface.peer {
                None => true,
                Some(peer) => {
                    let (peer_type, reference) = resolve_peer(ctx, name, &peer.chassis_id);
                    peer.peer_type == peer_type && peer.reference == reference
                }
            })
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        let mut types_changed = false;
        for (name, iface) in status.interfaces.iter_mut() {
            let Some(peer) = iface.peer.as_mut() else {
                continue;
            };
            let (peer_type, reference) = resolve_peer(ctx, name, &peer.chassis_id);
            if peer.peer_type != peer_type {
                debug!(interface = %name, from = %peer.peer_type, to = %peer_type, "peer type changed");
                types_changed = true;
            }
            peer.peer_type = peer_type;
            peer.reference = reference;
        }
        if types_changed {
            status.role = None;
        }
        status.switch_ports = switch_ports(status);
        Ok(())
    }
}

/// Settle the connection level and re-derive directions with it.
pub struct ResolveLevel;

impl Step for ResolveLevel {
    fn name(&self) -> &'static str {
        "resolve-level"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        resolve_level(ctx, status) == status.connection_level
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        let level = resolve_level(ctx, status);
        if level != status.connection_level {
            info!(
                switch = %ctx.switch.name,
                from = status.connection_level,
                to = level,
                "connection level resolved"
            );
        }
        status.connection_level = level;
        let directions = compute_directions(ctx, status, level);
        apply_directions(status, &directions);
        Ok(())
    }
}

/// Assign spine or leaf. A stored role that contradicts the peers halts the pass.
pub struct AssignRole;

impl Step for AssignRole {
    fn name(&self) -> &'static str {
        "assign-role"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        ctx.nics.is_none() || status.role == Some(compute_role(status))
    }

    fn advance(&self, _ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        let computed = compute_role(status);
        check_role(status.role, computed)?;
        status.role = Some(computed);
        Ok(())
    }
}

pub struct AssignDirections;

impl Step for AssignDirections {
    fn name(&self) -> &'static str {
        "assign-directions"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        let directions = compute_directions(ctx, status, status.connection_level);
        directions_match(status, &directions)
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        let directions = compute_directions(ctx, status, status.connection_level);
        apply_directions(status, &directions);
        Ok(())
    }
}
