//! Switch status model
//!
//! The persisted status record of a switch plus the neighbor facts it is
//! derived from. These types are embedded as-is into the operator's CRDs, so
//! they carry `serde` and `schemars` derives and camelCase field names.

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use macaddr::MacAddr6;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use strum::{Display, EnumString};

/// Connection level of a switch whose place in the hierarchy is not known yet.
pub const UNRESOLVED_LEVEL: u8 = 255;

/// Serde module for MAC addresses as colon-separated strings.
mod mac_address_string {
    use macaddr::MacAddr6;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(mac: &MacAddr6, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&mac.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<MacAddr6, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MacAddr6::from_str(&s).map_err(serde::de::Error::custom)
    }
}

fn unresolved_level() -> u8 {
    UNRESOLVED_LEVEL
}

/// Value-type reference to another resource in the store.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceRef {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
        }
    }
}

/// Fabric role of a switch.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SwitchRole {
    Spine,
    Leaf,
}

/// Primary convergence state.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SwitchState {
    Initial,
    Processing,
    Ready,
}

/// Interface direction relative to the top of the fabric.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Toward a lower connection level.
    North,
    /// Toward a higher connection level or end hosts.
    South,
}

/// Kind of device seen on the far side of a link.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PeerType {
    Machine,
    Switch,
    Router,
    #[default]
    Undefined,
}

impl PeerType {
    /// Classify a neighbor from its advertised LLDP system capabilities.
    pub fn from_capabilities<S: AsRef<str>>(capabilities: &[S]) -> Self {
        let has = |name: &str| {
            capabilities
                .iter()
                .any(|c| c.as_ref().eq_ignore_ascii_case(name))
        };
        if has("bridge") {
            PeerType::Switch
        } else if has("router") {
            PeerType::Router
        } else if has("station") {
            PeerType::Machine
        } else {
            PeerType::Undefined
        }
    }
}

/// Operational state of a port.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PortState {
    Up,
    #[default]
    Down,
}

/// Forward error correction mode.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FecMode {
    #[default]
    None,
    Rs,
    Fc,
}

/// Configuration hand-off state shared with the configuration agent.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigState {
    #[default]
    Initial,
    Pending,
    InProgress,
    Applied,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ManagerType {
    #[default]
    Local,
    Remote,
}

/// Liveness of the configuration agent as observed through `lastCheck`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ManagerState {
    #[default]
    Active,
    Failed,
}

/// IP address family.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Prefix length of the point-to-point block carved for each interface.
    pub fn link_prefix(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 30,
            AddressFamily::Ipv6 => 127,
        }
    }

    /// Addresses reserved per lane when sizing a south subnet.
    pub fn addresses_per_lane(&self) -> u128 {
        match self {
            AddressFamily::Ipv4 => 4,
            AddressFamily::Ipv6 => 2,
        }
    }

    /// Host offset of the subnet owner's address within a link block.
    pub fn owner_offset(&self) -> u128 {
        match self {
            AddressFamily::Ipv4 => 1,
            AddressFamily::Ipv6 => 0,
        }
    }

    /// Host offset of the north side's address within a link block.
    pub fn adjacent_offset(&self) -> u128 {
        match self {
            AddressFamily::Ipv4 => 2,
            AddressFamily::Ipv6 => 1,
        }
    }

    pub fn max_prefix(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

/// LLDP neighbor record as reported by the neighbor-fact source.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LldpNeighbor {
    pub chassis_id: String,
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub port_id: String,
    #[serde(default)]
    pub port_description: String,
    /// Enabled system capabilities, e.g. `Bridge`, `Router`, `Station`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// A network interface as reported by the neighbor-fact source.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Nic {
    pub name: String,

    #[schemars(with = "String")]
    #[serde(with = "mac_address_string")]
    pub mac: MacAddr6,

    /// Speed in Mb/s.
    #[serde(default)]
    pub speed: u32,

    #[serde(default = "default_lanes")]
    pub lanes: u8,

    #[serde(default = "default_mtu")]
    pub mtu: u16,

    #[serde(default)]
    pub fec: FecMode,

    #[serde(default)]
    pub up: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lldps: Vec<LldpNeighbor>,
}

fn default_lanes() -> u8 {
    1
}

fn default_mtu() -> u16 {
    9216
}

/// Peer seen on the far side of an interface.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub chassis_id: String,
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub port_id: String,
    #[serde(default)]
    pub port_description: String,
    #[serde(default, rename = "type")]
    pub peer_type: PeerType,
    /// Switch record of the peer once it has been matched by chassis id.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<ResourceRef>,
}

impl PeerInfo {
    /// True when both records describe the same far end, ignoring resolution.
    pub fn same_link(&self, other: &PeerInfo) -> bool {
        self.chassis_id == other.chassis_id
            && self.system_name == other.system_name
            && self.port_id == other.port_id
            && self.port_description == other.port_description
    }

    pub fn is_resolved(&self) -> bool {
        self.peer_type != PeerType::Undefined
    }
}

impl From<&LldpNeighbor> for PeerInfo {
    fn from(lldp: &LldpNeighbor) -> Self {
        Self {
            chassis_id: lldp.chassis_id.clone(),
            system_name: lldp.system_name.clone(),
            port_id: lldp.port_id.clone(),
            port_description: lldp.port_description.clone(),
            peer_type: PeerType::Undefined,
            reference: None,
        }
    }
}

/// Address assigned to an interface.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAddress {
    /// CIDR-qualified interface address, e.g. `10.0.0.1/30`.
    #[schemars(with = "String")]
    pub address: IpNet,
    /// Subnet resource the address was carved from.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<ResourceRef>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStatus {
    #[schemars(with = "String")]
    #[serde(with = "mac_address_string")]
    pub mac: MacAddr6,
    #[serde(default)]
    pub fec: FecMode,
    #[serde(default)]
    pub mtu: u16,
    #[serde(default)]
    pub speed: u32,
    #[serde(default)]
    pub lanes: u8,
    #[serde(default)]
    pub state: PortState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<InterfaceAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<InterfaceAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerInfo>,
}

impl InterfaceStatus {
    /// Build a fresh, unresolved interface from a reported NIC.
    pub fn from_nic(nic: &Nic) -> Self {
        Self {
            mac: nic.mac,
            fec: nic.fec,
            mtu: nic.mtu,
            speed: nic.speed,
            lanes: nic.lanes,
            state: if nic.up { PortState::Up } else { PortState::Down },
            direction: None,
            ipv4: None,
            ipv6: None,
            peer: nic.lldps.first().map(PeerInfo::from),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == PortState::Up
    }

    /// True when the physical facts of both records agree.
    pub fn same_facts(&self, other: &InterfaceStatus) -> bool {
        self.mac == other.mac
            && self.fec == other.fec
            && self.mtu == other.mtu
            && self.speed == other.speed
            && self.lanes == other.lanes
            && self.state == other.state
    }

    /// True when both records see the same neighbor (or none).
    pub fn same_peer(&self, other: &InterfaceStatus) -> bool {
        match (&self.peer, &other.peer) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_link(b),
            _ => false,
        }
    }

    pub fn address(&self, family: AddressFamily) -> Option<&InterfaceAddress> {
        match family {
            AddressFamily::Ipv4 => self.ipv4.as_ref(),
            AddressFamily::Ipv6 => self.ipv6.as_ref(),
        }
    }

    pub fn address_mut(&mut self, family: AddressFamily) -> &mut Option<InterfaceAddress> {
        match family {
            AddressFamily::Ipv4 => &mut self.ipv4,
            AddressFamily::Ipv6 => &mut self.ipv6,
        }
    }

    /// Peer switch reference, if the far end is a known switch record.
    pub fn peer_switch(&self) -> Option<&ResourceRef> {
        self.peer
            .as_ref()
            .filter(|p| p.peer_type == PeerType::Switch)
            .and_then(|p| p.reference.as_ref())
    }
}

/// South subnet obtained from an address pool.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    #[schemars(with = "String")]
    pub cidr: IpNet,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<ResourceRef>,
}

/// Loopback address obtained from an address pool.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoopbackStatus {
    #[schemars(with = "String")]
    pub address: IpAddr,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<ResourceRef>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub state: ConfigState,
    #[serde(default)]
    pub manager_type: ManagerType,
    #[serde(default)]
    pub manager_state: ManagerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

/// Persisted status of a switch. Mutated only by the convergence pipeline.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchStatus {
    #[serde(default)]
    pub total_ports: u32,

    #[serde(default)]
    pub switch_ports: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SwitchRole>,

    #[serde(default = "unresolved_level")]
    pub connection_level: u8,

    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_v4: Option<SubnetStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_v6: Option<SubnetStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loopback_v4: Option<LoopbackStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loopback_v6: Option<LoopbackStatus>,

    #[serde(default)]
    pub asn: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SwitchState>,

    #[serde(default)]
    pub configuration: ConfigurationStatus,
}

impl Default for SwitchStatus {
    fn default() -> Self {
        Self {
            total_ports: 0,
            switch_ports: 0,
            role: None,
            connection_level: UNRESOLVED_LEVEL,
            interfaces: BTreeMap::new(),
            subnet_v4: None,
            subnet_v6: None,
            loopback_v4: None,
            loopback_v6: None,
            asn: 0,
            state: None,
            configuration: ConfigurationStatus::default(),
        }
    }
}

impl SwitchStatus {
    pub fn is_level_resolved(&self) -> bool {
        self.connection_level != UNRESOLVED_LEVEL
    }

    pub fn is_ready(&self) -> bool {
        self.state == Some(SwitchState::Ready)
    }

    pub fn subnet(&self, family: AddressFamily) -> Option<&SubnetStatus> {
        match family {
            AddressFamily::Ipv4 => self.subnet_v4.as_ref(),
            AddressFamily::Ipv6 => self.subnet_v6.as_ref(),
        }
    }

    pub fn subnet_mut(&mut self, family: AddressFamily) -> &mut Option<SubnetStatus> {
        match family {
            AddressFamily::Ipv4 => &mut self.subnet_v4,
            AddressFamily::Ipv6 => &mut self.subnet_v6,
        }
    }

    pub fn loopback(&self, family: AddressFamily) -> Option<&LoopbackStatus> {
        match family {
            AddressFamily::Ipv4 => self.loopback_v4.as_ref(),
            AddressFamily::Ipv6 => self.loopback_v6.as_ref(),
        }
    }

    pub fn loopback_mut(&mut self, family: AddressFamily) -> &mut Option<LoopbackStatus> {
        match family {
            AddressFamily::Ipv4 => &mut self.loopback_v4,
            AddressFamily::Ipv6 => &mut self.loopback_v6,
        }
    }
}
