//! Repository seam between the controller and the Kubernetes API.

use crate::crds::{Inventory, Ip, Subnet, Switch};
use crate::error::ReconcileError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Everything a reconciliation pass reads or writes.
#[async_trait]
pub trait FabricRepository: Send + Sync {
    /// All switches in the operator's scope; the peer population of a pass.
    async fn list_switches(&self) -> Result<Vec<Switch>, ReconcileError>;

    async fn get_inventory(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Inventory>, ReconcileError>;

    async fn list_subnets(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Subnet>, ReconcileError>;

    async fn list_ips(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Ip>, ReconcileError>;

    /// Apply a merge patch to the status subresource. A patch carrying
    /// `metadata.resourceVersion` fails with [`ReconcileError::Conflict`]
    /// when the stored object has moved on.
    async fn patch_switch_status(
        &self,
        name: &str,
        namespace: &str,
        patch: serde_json::Value,
    ) -> Result<(), ReconcileError>;
}

/// Render a match-labels map as a Kubernetes label selector.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector() {
        let labels = BTreeMap::from([
            ("fabric.neolaas.io/switch".to_string(), "leaf-1".to_string()),
            ("fabric.neolaas.io/purpose".to_string(), "loopback".to_string()),
        ]);
        assert_eq!(
            label_selector(&labels),
            "fabric.neolaas.io/purpose=loopback,fabric.neolaas.io/switch=leaf-1"
        );
        assert_eq!(label_selector(&BTreeMap::new()), "");
    }
}
