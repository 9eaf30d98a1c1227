//! Inventory CRD
//!
//! Neighbor facts reported for a switch by the discovery agent. Read-only
//! for this operator.

use fabric_core::Nic;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.neolaas.io",
    version = "v1alpha1",
    kind = "Inventory",
    namespaced,
    printcolumn = r#"{"name":"Chassis", "type":"string", "jsonPath":".spec.chassisId"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InventorySpec {
    pub chassis_id: String,

    #[serde(default)]
    pub nics: Vec<Nic>,
}
