//! Address pool CRDs
//!
//! `Subnet` and `Ip` reservations are made by an external IPAM. The operator
//! only selects them by label and reads the reserved value.

use fabric_core::PoolEntry;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A CIDR reservation.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.neolaas.io",
    version = "v1alpha1",
    kind = "Subnet",
    namespaced,
    status = "SubnetStatus",
    printcolumn = r#"{"name":"CIDR", "type":"string", "jsonPath":".spec.cidr"}"#,
    printcolumn = r#"{"name":"Reserved", "type":"string", "jsonPath":".status.reserved"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub cidr: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,
}

impl Subnet {
    /// The reserved CIDR, falling back to the requested one.
    pub fn reserved_cidr(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.reserved.as_deref())
            .unwrap_or(&self.spec.cidr)
    }

    pub fn pool_entry(&self) -> PoolEntry {
        PoolEntry::new(self.name_any(), self.namespace(), self.reserved_cidr())
    }
}

/// A single address reservation.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.neolaas.io",
    version = "v1alpha1",
    kind = "Ip",
    namespaced,
    status = "IpStatus",
    printcolumn = r#"{"name":"Address", "type":"string", "jsonPath":".status.reserved"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IpSpec {
    /// Requested address; the IPAM picks one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,
}

impl Ip {
    pub fn reserved_address(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.reserved.as_deref())
            .or(self.spec.address.as_deref())
    }

    /// `None` while the IPAM has not settled on an address.
    pub fn pool_entry(&self) -> Option<PoolEntry> {
        self.reserved_address()
            .map(|addr| PoolEntry::new(self.name_any(), self.namespace(), addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_prefers_reserved_value() {
        let mut subnet = Subnet::new(
            "leaf-1-south",
            SubnetSpec {
                cidr: "10.0.0.0/16".to_string(),
            },
        );
        assert_eq!(subnet.reserved_cidr(), "10.0.0.0/16");

        subnet.status = Some(SubnetStatus {
            reserved: Some("10.0.4.0/24".to_string()),
        });
        let entry = subnet.pool_entry();
        assert_eq!(entry.value, "10.0.4.0/24");
        assert_eq!(entry.reference.name, "leaf-1-south");
    }

    #[test]
    fn test_ip_without_address_is_pending() {
        let ip = Ip::new("leaf-1-lo", IpSpec::default());
        assert!(ip.pool_entry().is_none());

        let ip = Ip::new(
            "leaf-1-lo",
            IpSpec {
                address: Some("10.255.0.7".to_string()),
            },
        );
        assert_eq!(ip.pool_entry().unwrap().value, "10.255.0.7");
    }
}
