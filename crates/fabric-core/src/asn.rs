//! BGP autonomous system number derivation.

use std::net::IpAddr;

/// First ASN of the 32-bit private range (RFC 6996).
pub const ASN_BASE: u32 = 4_200_000_000;

/// Derive a switch's ASN from its IPv4 loopback address.
///
/// The last three bytes of the address's 16-byte representation are folded
/// into the private range, so every loopback within a /8 maps to a distinct
/// ASN. An unset or unspecified loopback yields 0, the "not yet assigned"
/// sentinel.
pub fn derive_asn(loopback: Option<&IpAddr>) -> u32 {
    let octets = match loopback {
        None => return 0,
        Some(addr) if addr.is_unspecified() => return 0,
        Some(IpAddr::V4(v4)) => v4.to_ipv6_mapped().octets(),
        Some(IpAddr::V6(v6)) => v6.octets(),
    };

    ASN_BASE + u32::from(octets[13]) * 65536 + u32::from(octets[14]) * 256 + u32::from(octets[15])
}
