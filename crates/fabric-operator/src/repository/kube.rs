//! Kubernetes implementation of [`FabricRepository`].

use super::traits::{label_selector, FabricRepository};
use crate::crds::{Inventory, Ip, Subnet, Switch};
use crate::error::ReconcileError;
use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct KubeRepository {
    client: Client,
    /// Scope of the switch population; `None` is cluster-wide.
    namespace: Option<String>,
}

impl KubeRepository {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl FabricRepository for KubeRepository {
    async fn list_switches(&self) -> Result<Vec<Switch>, ReconcileError> {
        let api: Api<Switch> = match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_inventory(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Inventory>, ReconcileError> {
        let api: Api<Inventory> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_subnets(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Subnet>, ReconcileError> {
        let api: Api<Subnet> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&label_selector(selector));
        Ok(api.list(&params).await?.items)
    }

    async fn list_ips(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Ip>, ReconcileError> {
        let api: Api<Ip> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&label_selector(selector));
        Ok(api.list(&params).await?.items)
    }

    async fn patch_switch_status(
        &self,
        name: &str,
        namespace: &str,
        patch: serde_json::Value,
    ) -> Result<(), ReconcileError> {
        let api: Api<Switch> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
