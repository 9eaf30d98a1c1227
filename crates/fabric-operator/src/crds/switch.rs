//! Switch CRD
//!
//! Operators describe the switch; the status is owned by
//! the convergence engine and is the contract for the configuration agent.

use super::{PURPOSE_LABEL, PURPOSE_LOOPBACK, PURPOSE_SOUTH_SUBNET, SWITCH_LABEL};
use fabric_core::{ManagerType, SwitchIdentity, SwitchRecord, SwitchStatus};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Switch represents a physical fabric switch.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fabric.neolaas.io",
    version = "v1alpha1",
    kind = "Switch",
    namespaced,
    status = "SwitchStatus",
    printcolumn = r#"{"name":"Role", "type":"string", "jsonPath":".status.role"}"#,
    printcolumn = r#"{"name":"Level", "type":"integer", "jsonPath":".status.connectionLevel"}"#,
    printcolumn = r#"{"name":"ASN", "type":"integer", "jsonPath":".status.asn"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchSpec {
    /// LLDP chassis id; neighbors report this switch under it.
    pub chassis_id: String,

    #[serde(default)]
    pub hostname: String,

    /// Name of the Inventory holding this switch's neighbor facts.
    /// Defaults to the Switch's own name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_ref: Option<String>,

    /// Marks a switch at the top of the fabric (connection level 0).
    #[serde(default)]
    pub top_spine: bool,

    /// Whether the configuration agent manages this switch.
    #[serde(default)]
    pub managed: bool,

    #[serde(default)]
    pub manager_type: ManagerType,

    /// Label selectors overriding the default address pool lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamSelectors>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpamSelectors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub south_subnets: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loopbacks: Option<BTreeMap<String, String>>,
}

impl Switch {
    pub fn identity(&self) -> SwitchIdentity {
        SwitchIdentity {
            name: self.name_any(),
            namespace: self.namespace(),
            chassis_id: self.spec.chassis_id.clone(),
            hostname: self.spec.hostname.clone(),
            top_spine: self.spec.top_spine,
            managed: self.spec.managed,
            manager_type: self.spec.manager_type,
        }
    }

    /// Population entry for peer lookups. A switch without status yet is
    /// reported with the default (unresolved) status.
    pub fn record(&self) -> SwitchRecord {
        SwitchRecord {
            name: self.name_any(),
            namespace: self.namespace(),
            chassis_id: self.spec.chassis_id.clone(),
            status: self.status.clone().unwrap_or_default(),
        }
    }

    pub fn inventory_name(&self) -> String {
        self.spec
            .inventory_ref
            .clone()
            .unwrap_or_else(|| self.name_any())
    }

    pub fn south_subnet_selector(&self) -> BTreeMap<String, String> {
        self.spec
            .ipam
            .as_ref()
            .and_then(|ipam| ipam.south_subnets.clone())
            .unwrap_or_else(|| self.default_selector(PURPOSE_SOUTH_SUBNET))
    }

    pub fn loopback_selector(&self) -> BTreeMap<String, String> {
        self.spec
            .ipam
            .as_ref()
            .and_then(|ipam| ipam.loopbacks.clone())
            .unwrap_or_else(|| self.default_selector(PURPOSE_LOOPBACK))
    }

    fn default_selector(&self, purpose: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (SWITCH_LABEL.to_string(), self.name_any()),
            (PURPOSE_LABEL.to_string(), purpose.to_string()),
        ])
    }
}
