//! Custom Resource Definitions
//!
//! `Switch` is reconciled; `Inventory`, `Subnet` and `Ip` are inputs owned by
//! other systems.

pub mod inventory;
pub mod ipam;
pub mod switch;

pub use inventory::{Inventory, InventorySpec};
pub use ipam::{Ip, IpSpec, IpStatus, Subnet, SubnetSpec, SubnetStatus};
pub use switch::{IpamSelectors, Switch, SwitchSpec};

use kube::CustomResourceExt;

/// Label naming the switch an Inventory or pool reservation belongs to.
pub const SWITCH_LABEL: &str = "fabric.neolaas.io/switch";
pub const PURPOSE_LABEL: &str = "fabric.neolaas.io/purpose";
pub const PURPOSE_SOUTH_SUBNET: &str = "south-subnet";
pub const PURPOSE_LOOPBACK: &str = "loopback";

/// All CRD manifests as one multi-document YAML stream.
pub fn manifests() -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for crd in [Switch::crd(), Inventory::crd(), Subnet::crd(), Ip::crd()] {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd)?);
    }
    Ok(out)
}
