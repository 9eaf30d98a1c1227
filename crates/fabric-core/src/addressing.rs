//! Address allocation
//!
//! Each switch owns one south subnet per address family. Every south-facing
//! interface gets the fixed-width link block whose index is the port number
//! in its name (`Ethernet12` is block 12), and the switch takes the owner
//! offset inside it. The north side of a link never owns a block: it takes the
//! adjacent address from the block its peer already persisted, so both ends
//! agree without coordinating.

use crate::context::{PassContext, PoolEntry};
use crate::error::{FabricError, ValidationError};
use crate::model::{
    AddressFamily, Direction, InterfaceAddress, InterfaceStatus, LoopbackStatus, SubnetStatus,
    SwitchStatus,
};
use ipnet::IpNet;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Parse a reserved CIDR from a pool, normalising away host bits.
pub fn parse_cidr(value: &str) -> Result<IpNet, FabricError> {
    IpNet::from_str(value.trim())
        .map(|net| net.trunc())
        .map_err(|e| FabricError::malformed("cidr", value, e))
}

/// Parse a reserved address, with or without a prefix length.
pub fn parse_address(value: &str) -> Result<IpAddr, FabricError> {
    let value = value.trim();
    if let Ok(addr) = IpAddr::from_str(value) {
        return Ok(addr);
    }
    IpNet::from_str(value)
        .map(|net| net.addr())
        .map_err(|e| FabricError::malformed("address", value, e))
}

/// Port number parsed from the trailing digits of an interface name.
pub fn port_index(name: &str) -> Option<u32> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}

fn to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn from_u128(family: AddressFamily, value: u128) -> Option<IpAddr> {
    match family {
        AddressFamily::Ipv4 => u32::try_from(value)
            .ok()
            .map(|v| IpAddr::V4(Ipv4Addr::from(v))),
        AddressFamily::Ipv6 => Some(IpAddr::V6(Ipv6Addr::from(value))),
    }
}

fn family_of(net: &IpNet) -> AddressFamily {
    AddressFamily::of(&net.addr())
}

/// The `index`-th link block of a south subnet.
pub fn link_block(subnet: &IpNet, index: u32) -> Result<IpNet, FabricError> {
    let family = family_of(subnet);
    let link_prefix = family.link_prefix();
    let subnet = subnet.trunc();
    if subnet.prefix_len() > link_prefix {
        return Err(FabricError::malformed(
            "south subnet",
            subnet.to_string(),
            format!("prefix is narrower than /{link_prefix}"),
        ));
    }

    let spare_bits = u32::from(link_prefix - subnet.prefix_len());
    let blocks = 1u128.checked_shl(spare_bits).unwrap_or(u128::MAX);
    if u128::from(index) >= blocks {
        return Err(FabricError::malformed(
            "south subnet",
            subnet.to_string(),
            format!("holds {blocks} link blocks, port index {index} is out of range"),
        ));
    }

    let block_size = 1u128 << (family.max_prefix() - link_prefix);
    let base = to_u128(subnet.network()) + u128::from(index) * block_size;
    let addr = from_u128(family, base).ok_or_else(|| {
        FabricError::malformed("south subnet", subnet.to_string(), "block out of range")
    })?;
    IpNet::new(addr, link_prefix)
        .map_err(|e| FabricError::malformed("south subnet", subnet.to_string(), e))
}

fn offset_address(block: &IpNet, offset: u128) -> Result<IpNet, FabricError> {
    let family = family_of(block);
    let network = block.trunc();
    let value = to_u128(network.network())
        .checked_add(offset)
        .and_then(|v| from_u128(family, v))
        .filter(|addr| network.contains(addr))
        .ok_or_else(|| {
            FabricError::malformed("link block", network.to_string(), "offset outside block")
        })?;
    IpNet::new(value, network.prefix_len())
        .map_err(|e| FabricError::malformed("link block", network.to_string(), e))
}

/// The subnet owner's address on the link block for port `index`.
pub fn owner_address(subnet: &IpNet, index: u32) -> Result<IpNet, FabricError> {
    let block = link_block(subnet, index)?;
    offset_address(&block, family_of(subnet).owner_offset())
}

/// The north side's address on a link whose south side persisted `peer`.
pub fn adjacent_address(peer: &IpNet) -> Result<IpNet, FabricError> {
    offset_address(peer, family_of(peer).adjacent_offset())
}

/// Number of addresses a south subnet pool must hold for these interfaces.
pub fn required_south_addresses<'a>(
    interfaces: impl IntoIterator<Item = &'a InterfaceStatus>,
    family: AddressFamily,
) -> u128 {
    interfaces
        .into_iter()
        .filter(|iface| iface.is_active())
        .map(|iface| u128::from(iface.lanes) * family.addresses_per_lane())
        .sum()
}

/// Longest prefix whose subnet holds `count` addresses.
pub fn required_south_prefix(family: AddressFamily, count: u128) -> u8 {
    let max = family.max_prefix();
    let mut host_bits = 0u8;
    while host_bits < max && (1u128 << host_bits) < count {
        host_bits += 1;
    }
    max - host_bits
}

/// True when two interface networks share any address.
pub fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    let (a, b) = (a.trunc(), b.trunc());
    a.contains(&b.network()) || b.contains(&a.network())
}

fn pools_of_family(
    entries: &[PoolEntry],
    family: AddressFamily,
    parse: impl Fn(&str) -> Result<IpAddr, FabricError>,
) -> Result<Vec<&PoolEntry>, FabricError> {
    let mut matching = Vec::new();
    for entry in entries {
        if AddressFamily::of(&parse(&entry.value)?) == family {
            matching.push(entry);
        }
    }
    matching.sort_by(|a, b| a.reference.cmp(&b.reference));
    Ok(matching)
}

/// South subnet offered by the pools for `family`, if any is reserved yet.
pub fn select_subnet(
    entries: &[PoolEntry],
    family: AddressFamily,
) -> Result<Option<SubnetStatus>, FabricError> {
    let candidates = pools_of_family(entries, family, |v| parse_cidr(v).map(|n| n.addr()))?;
    candidates
        .first()
        .map(|entry| {
            Ok(SubnetStatus {
                cidr: parse_cidr(&entry.value)?,
                reference: Some(entry.reference.clone()),
            })
        })
        .transpose()
}

/// Loopback address offered by the pools for `family`, if any is reserved yet.
pub fn select_loopback(
    entries: &[PoolEntry],
    family: AddressFamily,
) -> Result<Option<LoopbackStatus>, FabricError> {
    let candidates = pools_of_family(entries, family, parse_address)?;
    candidates
        .first()
        .map(|entry| {
            Ok(LoopbackStatus {
                address: parse_address(&entry.value)?,
                reference: Some(entry.reference.clone()),
            })
        })
        .transpose()
}

/// Address the north side of an interface should carry, read from the peer.
fn north_address(
    ctx: &PassContext,
    iface: &InterfaceStatus,
    family: AddressFamily,
) -> Result<Option<InterfaceAddress>, FabricError> {
    let Some(peer) = iface.peer.as_ref() else {
        return Ok(None);
    };
    let Some(record) = peer.reference.as_ref().and_then(|r| ctx.find_switch(r)) else {
        return Ok(None);
    };
    let far_end = record.status.interfaces.get(&peer.port_id).or_else(|| {
        record
            .status
            .interfaces
            .get(&peer.port_description)
            .filter(|_| !peer.port_description.is_empty())
    });
    let Some(peer_address) = far_end.and_then(|i| i.address(family)) else {
        return Ok(None);
    };

    Ok(Some(InterfaceAddress {
        address: adjacent_address(&peer_address.address)?,
        reference: peer_address.reference.clone(),
    }))
}

/// Compute the desired address of every interface for one family.
///
/// Interfaces missing from the result keep whatever they have stored: their
/// prerequisites (subnet, peer address) are not available yet.
pub fn desired_addresses(
    ctx: &PassContext,
    status: &SwitchStatus,
    family: AddressFamily,
) -> Result<BTreeMap<String, InterfaceAddress>, FabricError> {
    let mut desired = BTreeMap::new();
    let mut owners: BTreeMap<u32, &str> = BTreeMap::new();

    for (name, iface) in &status.interfaces {
        match iface.direction {
            Some(Direction::South) => {
                let Some(subnet) = status.subnet(family) else {
                    continue;
                };
                let index = port_index(name).ok_or_else(|| {
                    FabricError::malformed("interface name", name.clone(), "no port number")
                })?;
                if let Some(first) = owners.insert(index, name) {
                    return Err(ValidationError::DuplicatePortIndex {
                        first: first.to_string(),
                        second: name.clone(),
                        index,
                    }
                    .into());
                }
                desired.insert(
                    name.clone(),
                    InterfaceAddress {
                        address: owner_address(&subnet.cidr, index)?,
                        reference: subnet.reference.clone(),
                    },
                );
            }
            Some(Direction::North) => {
                if let Some(address) = north_address(ctx, iface, family)? {
                    desired.insert(name.clone(), address);
                }
            }
            None => {}
        }
    }

    Ok(desired)
}

/// Verify that no two interfaces of the switch carry overlapping networks.
pub fn check_disjoint(status: &SwitchStatus) -> Result<(), ValidationError> {
    let assigned: Vec<(&String, &IpNet)> = status
        .interfaces
        .iter()
        .flat_map(|(name, iface)| {
            [iface.ipv4.as_ref(), iface.ipv6.as_ref()]
                .into_iter()
                .flatten()
                .map(move |a| (name, &a.address))
        })
        .collect();

    for (i, (first, a)) in assigned.iter().enumerate() {
        for (second, b) in &assigned[i + 1..] {
            if first != second && overlaps(a, b) {
                return Err(ValidationError::OverlappingAddresses {
                    first: (*first).clone(),
                    second: (*second).clone(),
                });
            }
        }
    }
    Ok(())
}
