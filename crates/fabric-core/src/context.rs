//! Per-pass input snapshot
//!
//! Everything a reconciliation pass reads from the outside world is loaded
//! once, up front, into a [`PassContext`]. The steps themselves never perform
//! I/O, so a pass can be abandoned at any point and re-run from scratch.

use crate::model::{AddressFamily, ManagerType, Nic, ResourceRef, SwitchStatus};
use chrono::{DateTime, Duration, Utc};

/// Identity and spec-level settings of the switch being reconciled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchIdentity {
    pub name: String,
    pub namespace: Option<String>,
    pub chassis_id: String,
    pub hostname: String,
    /// Externally designated top of the fabric (connection level 0).
    pub top_spine: bool,
    pub managed: bool,
    pub manager_type: ManagerType,
}

impl SwitchIdentity {
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.name.clone(), self.namespace.clone())
    }
}

/// A switch from the population snapshot, as last persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchRecord {
    pub name: String,
    pub namespace: Option<String>,
    pub chassis_id: String,
    pub status: SwitchStatus,
}

impl SwitchRecord {
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.name.clone(), self.namespace.clone())
    }

    pub fn matches(&self, reference: &ResourceRef) -> bool {
        self.name == reference.name
            && (reference.namespace.is_none() || self.namespace == reference.namespace)
    }
}

/// A reserved CIDR or address from an address pool resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolEntry {
    pub reference: ResourceRef,
    /// Raw reserved value, parsed lazily so malformed data surfaces as an error.
    pub value: String,
}

impl PoolEntry {
    pub fn new(name: impl Into<String>, namespace: Option<String>, value: impl Into<String>) -> Self {
        Self {
            reference: ResourceRef::new(name, namespace),
            value: value.into(),
        }
    }
}

/// Pool resources selected for this switch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub south_subnets: Vec<PoolEntry>,
    pub loopbacks: Vec<PoolEntry>,
}

/// Tunables of the engine that do not come from the switch itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Address families a switch must be addressed in before it is ready.
    pub families: Vec<AddressFamily>,
    /// Age of `configuration.lastCheck` after which the agent is considered failed.
    pub liveness_threshold: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            families: AddressFamily::ALL.to_vec(),
            liveness_threshold: Duration::minutes(5),
        }
    }
}

impl EngineSettings {
    pub fn has_family(&self, family: AddressFamily) -> bool {
        self.families.contains(&family)
    }
}

/// Eventually-consistent snapshot of everything one pass may read.
#[derive(Clone, Debug)]
pub struct PassContext {
    pub switch: SwitchIdentity,
    /// Neighbor facts for this switch; `None` until the fact source reports.
    pub nics: Option<Vec<Nic>>,
    /// All switch records visible to the operator, possibly including this one.
    pub population: Vec<SwitchRecord>,
    pub pools: PoolSnapshot,
    pub settings: EngineSettings,
    pub now: DateTime<Utc>,
}

impl PassContext {
    pub fn new(switch: SwitchIdentity, now: DateTime<Utc>) -> Self {
        Self {
            switch,
            nics: None,
            population: Vec::new(),
            pools: PoolSnapshot::default(),
            settings: EngineSettings::default(),
            now,
        }
    }

    /// Other switches of the population, excluding the one being reconciled.
    pub fn peers(&self) -> impl Iterator<Item = &SwitchRecord> {
        self.population
            .iter()
            .filter(move |r| r.name != self.switch.name || r.namespace != self.switch.namespace)
    }

    pub fn find_switch(&self, reference: &ResourceRef) -> Option<&SwitchRecord> {
        self.peers().find(|r| r.matches(reference))
    }

    pub fn find_by_chassis(&self, chassis_id: &str) -> Option<&SwitchRecord> {
        self.peers()
            .find(|r| !r.chassis_id.is_empty() && r.chassis_id.eq_ignore_ascii_case(chassis_id))
    }

    /// Capabilities advertised by the neighbor on an interface, from the facts.
    pub fn peer_capabilities(&self, interface: &str) -> &[String] {
        self.nics
            .as_deref()
            .and_then(|nics| nics.iter().find(|n| n.name == interface))
            .and_then(|n| n.lldps.first())
            .map(|l| l.capabilities.as_slice())
            .unwrap_or(&[])
    }
}
