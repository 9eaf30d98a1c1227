//! Builders shared by the unit tests.

use crate::context::{SwitchIdentity, SwitchRecord};
use crate::model::{
    FecMode, InterfaceStatus, LldpNeighbor, Nic, PeerInfo, PeerType, PortState, ResourceRef,
    SwitchStatus,
};
use macaddr::MacAddr6;

pub(crate) fn chassis(name: &str) -> String {
    format!("chassis-{name}")
}

pub(crate) fn identity(name: &str) -> SwitchIdentity {
    SwitchIdentity {
        name: name.to_string(),
        namespace: None,
        chassis_id: chassis(name),
        hostname: name.to_string(),
        ..Default::default()
    }
}

pub(crate) fn record(name: &str, level: u8) -> SwitchRecord {
    SwitchRecord {
        name: name.to_string(),
        namespace: None,
        chassis_id: chassis(name),
        status: SwitchStatus {
            connection_level: level,
            ..Default::default()
        },
    }
}

fn interface(peer: PeerInfo) -> InterfaceStatus {
    InterfaceStatus {
        mac: MacAddr6::new(0x00, 0xde, 0x11, 0x64, 0x00, 0x01),
        fec: FecMode::Rs,
        mtu: 9216,
        speed: 100_000,
        lanes: 4,
        state: PortState::Up,
        direction: None,
        ipv4: None,
        ipv6: None,
        peer: Some(peer),
    }
}

/// Interface already resolved to the switch `peer` on port `peer_port`.
pub(crate) fn linked_interface(peer: &str, peer_port: &str) -> InterfaceStatus {
    interface(PeerInfo {
        chassis_id: chassis(peer),
        system_name: peer.to_string(),
        port_id: peer_port.to_string(),
        port_description: String::new(),
        peer_type: PeerType::Switch,
        reference: Some(ResourceRef::new(peer, None)),
    })
}

pub(crate) fn machine_interface(host: &str) -> InterfaceStatus {
    interface(PeerInfo {
        chassis_id: chassis(host),
        system_name: host.to_string(),
        port_id: "eth0".to_string(),
        port_description: String::new(),
        peer_type: PeerType::Machine,
        reference: None,
    })
}

/// Reported NIC with one LLDP neighbor.
pub(crate) fn nic_to(id: u8, name: &str, peer: &str, peer_port: &str, capabilities: &[&str]) -> Nic {
    Nic {
        name: name.to_string(),
        mac: MacAddr6::new(0x00, 0xde, 0x11, 0x64, 0x10, id),
        speed: 100_000,
        lanes: 4,
        mtu: 9216,
        fec: FecMode::Rs,
        up: true,
        lldps: vec![LldpNeighbor {
            chassis_id: chassis(peer),
            system_name: peer.to_string(),
            port_id: peer_port.to_string(),
            port_description: String::new(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }],
    }
}
