//! Multi-switch convergence tests.
//!
//! Runs the standard pipeline over a small fabric, one pass per switch per
//! round, persisting each change before the next switch reads the population.

use crate::addressing::check_disjoint;
use crate::asn::ASN_BASE;
use crate::context::{EngineSettings, PassContext, PoolEntry, PoolSnapshot, SwitchIdentity, SwitchRecord};
use crate::error::FabricError;
use crate::model::{
    AddressFamily, ConfigState, Direction, ManagerState, Nic, SwitchRole, SwitchState,
    SwitchStatus,
};
use crate::pipeline::{PassOutcome, Pipeline};
use crate::steps::standard_pipeline;
use crate::testing::{identity, nic_to};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

struct SimSwitch {
    identity: SwitchIdentity,
    nics: Vec<Nic>,
    pools: PoolSnapshot,
    status: SwitchStatus,
}

struct Fabric {
    switches: BTreeMap<String, SimSwitch>,
    settings: EngineSettings,
    pipeline: Pipeline,
    now: DateTime<Utc>,
}

impl Fabric {
    fn new(families: Vec<AddressFamily>) -> Self {
        Self {
            switches: BTreeMap::new(),
            settings: EngineSettings {
                families,
                ..Default::default()
            },
            pipeline: standard_pipeline(),
            now: Utc::now(),
        }
    }

    fn add(&mut self, name: &str, top_spine: bool, nics: Vec<Nic>, subnets: &[&str], loopbacks: &[&str]) {
        let mut identity = identity(name);
        identity.top_spine = top_spine;
        let pools = PoolSnapshot {
            south_subnets: subnets
                .iter()
                .enumerate()
                .map(|(i, cidr)| PoolEntry::new(format!("{name}-south-{i}"), None, *cidr))
                .collect(),
            loopbacks: loopbacks
                .iter()
                .enumerate()
                .map(|(i, addr)| PoolEntry::new(format!("{name}-lo-{i}"), None, *addr))
                .collect(),
        };
        self.switches.insert(
            name.to_string(),
            SimSwitch {
                identity,
                nics,
                pools,
                status: SwitchStatus::default(),
            },
        );
    }

    fn population(&self) -> Vec<SwitchRecord> {
        self.switches
            .values()
            .map(|s| SwitchRecord {
                name: s.identity.name.clone(),
                namespace: None,
                chassis_id: s.identity.chassis_id.clone(),
                status: s.status.clone(),
            })
            .collect()
    }

    fn pass(&mut self, name: &str) -> Result<PassOutcome, FabricError> {
        let population = self.population();
        let switch = &self.switches[name];
        let ctx = PassContext {
            switch: switch.identity.clone(),
            nics: Some(switch.nics.clone()),
            population,
            pools: switch.pools.clone(),
            settings: self.settings.clone(),
            now: self.now,
        };
        let outcome = self.pipeline.run_pass(&ctx, &switch.status)?;
        if let PassOutcome::Changed { status, .. } = &outcome {
            self.switches.get_mut(name).unwrap().status = status.clone();
        }
        Ok(outcome)
    }

    /// Run rounds until a whole round persists nothing. Returns the round count.
    fn converge(&mut self) -> usize {
        let names: Vec<String> = self.switches.keys().cloned().collect();
        for round in 1..=100 {
            let mut changed = false;
            for name in &names {
                changed |= self.pass(name).unwrap().is_changed();
            }
            if !changed {
                return round;
            }
        }
        panic!("fabric did not converge");
    }

    fn status(&self, name: &str) -> &SwitchStatus {
        &self.switches[name].status
    }

    fn address(&self, name: &str, iface: &str, family: AddressFamily) -> String {
        self.status(name).interfaces[iface]
            .address(family)
            .map(|a| a.address.to_string())
            .unwrap_or_default()
    }
}

const BRIDGE: &[&str] = &["Bridge", "Router"];

/// Two top spines and two aggregation switches, each linked to both spines.
fn two_tier(families: Vec<AddressFamily>) -> Fabric {
    let mut fabric = Fabric::new(families);
    fabric.add(
        "spine-1",
        true,
        vec![
            nic_to(0, "Ethernet0", "agg-1", "Ethernet48", BRIDGE),
            nic_to(1, "Ethernet1", "agg-2", "Ethernet48", BRIDGE),
        ],
        &["10.0.0.0/24", "fd00:0:0:1::/64"],
        &["10.255.0.1", "fd00:ff::1"],
    );
    fabric.add(
        "spine-2",
        true,
        vec![
            nic_to(2, "Ethernet0", "agg-1", "Ethernet49", BRIDGE),
            nic_to(3, "Ethernet1", "agg-2", "Ethernet49", BRIDGE),
        ],
        &["10.0.1.0/24", "fd00:0:0:2::/64"],
        &["10.255.0.2", "fd00:ff::2"],
    );
    fabric.add(
        "agg-1",
        false,
        vec![
            nic_to(4, "Ethernet48", "spine-1", "Ethernet0", BRIDGE),
            nic_to(5, "Ethernet49", "spine-2", "Ethernet0", BRIDGE),
        ],
        &["10.1.0.0/24", "fd00:0:0:11::/64"],
        &["10.255.1.1", "fd00:ff::11"],
    );
    fabric.add(
        "agg-2",
        false,
        vec![
            nic_to(6, "Ethernet48", "spine-1", "Ethernet1", BRIDGE),
            nic_to(7, "Ethernet49", "spine-2", "Ethernet1", BRIDGE),
        ],
        &["10.2.0.0/24", "fd00:0:0:12::/64"],
        &["10.255.1.2", "fd00:ff::12"],
    );
    fabric
}

fn assert_fabric_invariants(fabric: &Fabric) {
    for (name, sw) in &fabric.switches {
        let status = &sw.status;
        if status.connection_level == 0 {
            for iface in status.interfaces.values().filter(|i| i.is_active()) {
                assert_eq!(iface.direction, Some(Direction::South), "{name}");
            }
        }
        for iface in status.interfaces.values() {
            if let Some(peer) = iface.peer_switch() {
                let other = fabric.status(&peer.name);
                let diff = (i16::from(status.connection_level) - i16::from(other.connection_level)).abs();
                assert_eq!(diff, 1, "{name} <-> {}", peer.name);
            }
        }
        check_disjoint(status).unwrap();
    }
}

#[test]
fn test_two_tier_fabric_converges() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.converge();

    for spine in ["spine-1", "spine-2"] {
        assert_eq!(fabric.status(spine).connection_level, 0);
    }
    for agg in ["agg-1", "agg-2"] {
        let status = fabric.status(agg);
        assert_eq!(status.connection_level, 1);
        assert_eq!(status.state, Some(SwitchState::Ready));
        assert_eq!(status.role, Some(SwitchRole::Spine));
        assert_eq!(status.switch_ports, 2);
        for iface in status.interfaces.values() {
            assert_eq!(iface.direction, Some(Direction::North));
        }
    }

    assert_eq!(fabric.address("spine-1", "Ethernet0", AddressFamily::Ipv4), "10.0.0.1/30");
    assert_eq!(fabric.address("agg-1", "Ethernet48", AddressFamily::Ipv4), "10.0.0.2/30");
    assert_eq!(fabric.address("spine-1", "Ethernet1", AddressFamily::Ipv4), "10.0.0.5/30");
    assert_eq!(fabric.address("agg-2", "Ethernet48", AddressFamily::Ipv4), "10.0.0.6/30");
    assert_eq!(fabric.address("spine-2", "Ethernet0", AddressFamily::Ipv4), "10.0.1.1/30");
    assert_eq!(fabric.address("agg-1", "Ethernet49", AddressFamily::Ipv4), "10.0.1.2/30");

    assert_eq!(fabric.status("spine-1").asn, ASN_BASE + 255 * 65536 + 1);
    assert_fabric_invariants(&fabric);
}

#[test]
fn test_dual_stack_addresses() {
    let mut fabric = two_tier(AddressFamily::ALL.to_vec());
    fabric.converge();

    assert_eq!(fabric.address("spine-2", "Ethernet1", AddressFamily::Ipv6), "fd00:0:0:2::2/127");
    assert_eq!(fabric.address("agg-2", "Ethernet49", AddressFamily::Ipv6), "fd00:0:0:2::3/127");
    for name in ["spine-1", "spine-2", "agg-1", "agg-2"] {
        assert!(fabric.status(name).is_ready(), "{name}");
    }
    assert_fabric_invariants(&fabric);
}

#[test]
fn test_converged_fabric_is_idempotent() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.converge();

    for name in ["spine-1", "spine-2", "agg-1", "agg-2"] {
        assert_eq!(fabric.pass(name).unwrap(), PassOutcome::Unchanged, "{name}");
    }
}

#[test]
fn test_missing_pool_blocks_readiness_until_it_appears() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.switches.get_mut("agg-1").unwrap().pools.loopbacks.clear();
    fabric.converge();

    let status = fabric.status("agg-1");
    assert_eq!(status.state, Some(SwitchState::Processing));
    assert_eq!(status.asn, 0);
    assert_eq!(status.connection_level, 1);

    fabric.switches.get_mut("agg-1").unwrap().pools.loopbacks =
        vec![PoolEntry::new("agg-1-lo", None, "10.255.1.1")];
    fabric.converge();
    assert!(fabric.status("agg-1").is_ready());
    assert_eq!(fabric.status("agg-1").asn, ASN_BASE + 255 * 65536 + 256 + 1);
}

#[test]
fn test_machine_peer_flips_role() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.converge();
    assert_eq!(fabric.status("agg-1").role, Some(SwitchRole::Spine));

    let server = nic_to(8, "Ethernet0", "server-1", "eth0", &["Station"]);
    fabric.switches.get_mut("agg-1").unwrap().nics.push(server);
    fabric.converge();
    let status = fabric.status("agg-1");
    assert_eq!(status.role, Some(SwitchRole::Leaf));
    assert_eq!(status.connection_level, 1);
    assert_eq!(status.interfaces["Ethernet0"].direction, Some(Direction::South));
    assert_eq!(fabric.address("agg-1", "Ethernet0", AddressFamily::Ipv4), "10.1.0.1/30");
    assert!(status.is_ready());

    fabric
        .switches
        .get_mut("agg-1")
        .unwrap()
        .nics
        .retain(|nic| nic.name != "Ethernet0");
    fabric.converge();
    assert_eq!(fabric.status("agg-1").role, Some(SwitchRole::Spine));
    assert_fabric_invariants(&fabric);
}

#[test]
fn test_unreachable_switch_stays_unresolved() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.add(
        "island",
        false,
        vec![nic_to(9, "Ethernet0", "nobody", "Ethernet0", BRIDGE)],
        &["10.9.0.0/24"],
        &["10.255.9.1"],
    );
    fabric.converge();

    let status = fabric.status("island");
    assert!(!status.is_level_resolved());
    assert_eq!(status.state, Some(SwitchState::Processing));
}

#[test]
fn test_stale_agent_fails_liveness() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.switches.get_mut("agg-1").unwrap().identity.managed = true;
    fabric.converge();

    let status = fabric.status("agg-1");
    assert!(status.is_ready());
    assert_eq!(status.configuration.state, ConfigState::Pending);

    // The agent applied the configuration and reported, then went quiet.
    let now = fabric.now;
    {
        let config = &mut fabric.switches.get_mut("agg-1").unwrap().status.configuration;
        config.state = ConfigState::Applied;
        config.last_check = Some(now - Duration::minutes(10));
    }

    let PassOutcome::Changed { step, status } = fabric.pass("agg-1").unwrap() else {
        panic!("expected the liveness check to fire");
    };
    assert_eq!(step, "configuration-liveness");
    assert_eq!(status.configuration.manager_state, ManagerState::Failed);
    assert_eq!(status.configuration.state, ConfigState::Pending);
}

#[test]
fn test_reset_hands_managed_switch_back_to_agent() {
    let mut fabric = two_tier(vec![AddressFamily::Ipv4]);
    fabric.switches.get_mut("agg-1").unwrap().identity.managed = true;
    fabric.converge();

    let now = fabric.now;
    {
        let config = &mut fabric.switches.get_mut("agg-1").unwrap().status.configuration;
        config.state = ConfigState::Applied;
        config.last_check = Some(now);
    }

    let server = nic_to(8, "Ethernet0", "server-1", "eth0", &["Station"]);
    fabric.switches.get_mut("agg-1").unwrap().nics.push(server);
    fabric.converge();

    let status = fabric.status("agg-1");
    assert!(status.is_ready());
    assert_eq!(status.role, Some(SwitchRole::Leaf));
    assert_eq!(fabric.address("agg-1", "Ethernet0", AddressFamily::Ipv4), "10.1.0.1/30");
    assert_eq!(status.configuration.state, ConfigState::Pending);
    assert_eq!(status.configuration.manager_state, ManagerState::Active);
}

#[test]
fn test_three_tier_fabric_converges() {
    let mut fabric = Fabric::new(vec![AddressFamily::Ipv4]);
    fabric.add(
        "spine-1",
        true,
        vec![nic_to(0, "Ethernet0", "agg-1", "Ethernet48", BRIDGE)],
        &["10.0.0.0/24"],
        &["10.255.0.1"],
    );
    fabric.add(
        "agg-1",
        false,
        vec![
            nic_to(1, "Ethernet48", "spine-1", "Ethernet0", BRIDGE),
            nic_to(2, "Ethernet2", "leaf-1", "Ethernet3", BRIDGE),
        ],
        &["10.1.0.0/24"],
        &["10.255.1.1"],
    );
    fabric.add(
        "leaf-1",
        false,
        vec![
            nic_to(3, "Ethernet3", "agg-1", "Ethernet2", BRIDGE),
            nic_to(4, "Ethernet0", "server-1", "eth0", &["Station"]),
        ],
        &["10.2.0.0/24"],
        &["10.255.2.1"],
    );
    fabric.converge();

    assert_eq!(fabric.status("spine-1").connection_level, 0);
    assert_eq!(fabric.status("agg-1").connection_level, 1);
    assert_eq!(fabric.status("agg-1").role, Some(SwitchRole::Spine));

    let leaf = fabric.status("leaf-1");
    assert_eq!(leaf.connection_level, 2);
    assert_eq!(leaf.role, Some(SwitchRole::Leaf));
    assert_eq!(leaf.interfaces["Ethernet3"].direction, Some(Direction::North));
    assert_eq!(leaf.interfaces["Ethernet0"].direction, Some(Direction::South));
    assert_eq!(fabric.address("agg-1", "Ethernet2", AddressFamily::Ipv4), "10.1.0.9/30");
    assert_eq!(fabric.address("leaf-1", "Ethernet3", AddressFamily::Ipv4), "10.1.0.10/30");
    assert_eq!(fabric.address("leaf-1", "Ethernet0", AddressFamily::Ipv4), "10.2.0.1/30");
    for name in ["spine-1", "agg-1", "leaf-1"] {
        assert!(fabric.status(name).is_ready(), "{name}");
    }
    assert_fabric_invariants(&fabric);
}
