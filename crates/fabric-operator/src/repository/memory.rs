//! In-memory [`FabricRepository`] for controller tests.
//!
//! Objects are stored as they would be by the API server: status patches are
//! applied with JSON merge semantics and every write bumps the resource
//! version, so stale writes are rejected the same way.

use super::traits::FabricRepository;
use crate::crds::{Inventory, Ip, Subnet, Switch};
use crate::error::ReconcileError;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Key = (String, String);

fn key_of<K: Resource>(obj: &K) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

fn selected<K: Resource>(obj: &K, namespace: &str, selector: &BTreeMap<String, String>) -> bool {
    obj.namespace().as_deref() == Some(namespace)
        && selector
            .iter()
            .all(|(k, v)| obj.labels().get(k) == Some(v))
}

/// RFC 7386 merge of `patch` into `target`.
fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    let object = target.as_object_mut().unwrap();
    for (key, value) in fields {
        if value.is_null() {
            object.remove(key);
        } else {
            merge(object.entry(key.clone()).or_insert(Value::Null), value);
        }
    }
}

#[derive(Default)]
pub(crate) struct MemoryRepository {
    switches: Mutex<BTreeMap<Key, Switch>>,
    inventories: Mutex<BTreeMap<Key, Inventory>>,
    subnets: Mutex<Vec<Subnet>>,
    ips: Mutex<Vec<Ip>>,
    next_version: AtomicUsize,
    patches: Mutex<Vec<Value>>,
}

impl MemoryRepository {
    fn bump(&self, switch: &mut Switch) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        switch.meta_mut().resource_version = Some(version.to_string());
    }

    pub fn put_switch(&self, mut switch: Switch) {
        self.bump(&mut switch);
        self.switches.lock().unwrap().insert(key_of(&switch), switch);
    }

    pub fn switch(&self, namespace: &str, name: &str) -> Switch {
        self.switches.lock().unwrap()[&(namespace.to_string(), name.to_string())].clone()
    }

    pub fn put_inventory(&self, inventory: Inventory) {
        self.inventories
            .lock()
            .unwrap()
            .insert(key_of(&inventory), inventory);
    }

    pub fn put_subnet(&self, subnet: Subnet) {
        self.subnets.lock().unwrap().push(subnet);
    }

    pub fn put_ip(&self, ip: Ip) {
        self.ips.lock().unwrap().push(ip);
    }

    /// Every status patch accepted so far, oldest first.
    pub fn patches(&self) -> Vec<Value> {
        self.patches.lock().unwrap().clone()
    }
}

#[async_trait]
impl FabricRepository for MemoryRepository {
    async fn list_switches(&self) -> Result<Vec<Switch>, ReconcileError> {
        Ok(self.switches.lock().unwrap().values().cloned().collect())
    }

    async fn get_inventory(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Inventory>, ReconcileError> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.inventories.lock().unwrap().get(&key).cloned())
    }

    async fn list_subnets(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Subnet>, ReconcileError> {
        Ok(self
            .subnets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| selected(*s, namespace, selector))
            .cloned()
            .collect())
    }

    async fn list_ips(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Ip>, ReconcileError> {
        Ok(self
            .ips
            .lock()
            .unwrap()
            .iter()
            .filter(|ip| selected(*ip, namespace, selector))
            .cloned()
            .collect())
    }

    async fn patch_switch_status(
        &self,
        name: &str,
        namespace: &str,
        patch: Value,
    ) -> Result<(), ReconcileError> {
        let mut switches = self.switches.lock().unwrap();
        let stored = switches
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("patched switch exists");

        if let Some(expected) = patch.pointer("/metadata/resourceVersion").and_then(Value::as_str) {
            if stored.resource_version().as_deref() != Some(expected) {
                return Err(ReconcileError::Conflict(format!(
                    "{name}: resource version {expected} is stale"
                )));
            }
        }

        let mut status = serde_json::to_value(&stored.status)?;
        if let Some(status_patch) = patch.get("status") {
            merge(&mut status, status_patch);
        }
        stored.status = Some(serde_json::from_value(status)?);
        self.bump(stored);
        self.patches.lock().unwrap().push(patch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_removes_nulls() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge(&mut target, &json!({"a": null, "b": {"c": null, "e": 4}}));
        assert_eq!(target, json!({"b": {"d": 3, "e": 4}}));
    }

    #[test]
    fn test_merge_replaces_arrays_and_scalars() {
        let mut target = json!({"list": [1, 2], "n": 1});
        merge(&mut target, &json!({"list": [3], "n": "x"}));
        assert_eq!(target, json!({"list": [3], "n": "x"}));
    }
}
