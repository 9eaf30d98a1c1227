//! Switch controller
//!
//! Drives each Switch's status toward `ready` one increment per pass. A pass
//! loads a snapshot (population, neighbor facts, pools), runs the pipeline
//! synchronously and persists at most one change. Changes to inputs and to
//! peer switches retrigger the affected switches through watches.

use super::status::status_patch;
use super::Context;
use crate::crds::{Inventory, Ip, Subnet, Switch, SWITCH_LABEL};
use crate::error::ReconcileError;
use crate::observability::{events, metrics};
use chrono::Utc;
use fabric_core::{
    ManagerState, PassContext, PassOutcome, PoolSnapshot, SwitchState, SwitchStatus,
};
use futures::StreamExt;
use kube::{
    api::Api,
    runtime::{
        controller::{Action, Controller},
        reflector::ObjectRef,
        watcher::Config,
    },
    Client, Resource, ResourceExt,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

pub struct SwitchController;

impl SwitchController {
    pub async fn run(client: Client, ctx: Arc<Context>) {
        let namespace = ctx.config.namespace.clone();
        let api = |client: &Client| -> Api<Switch> {
            scoped_api(client.clone(), namespace.as_deref())
        };

        let controller = Controller::new(api(&client), Config::default());
        let subnet_store = controller.store();
        let ip_store = controller.store();

        controller
            .watches(
                scoped_api::<Inventory>(client.clone(), namespace.as_deref()),
                Config::default(),
                |inventory| inventory_owner(&inventory),
            )
            .watches(
                scoped_api::<Subnet>(client.clone(), namespace.as_deref()),
                Config::default(),
                move |subnet| {
                    pool_owners(&subnet, &subnet_store.state(), Switch::south_subnet_selector)
                },
            )
            .watches(
                scoped_api::<Ip>(client.clone(), namespace.as_deref()),
                Config::default(),
                move |ip| pool_owners(&ip, &ip_store.state(), Switch::loopback_selector),
            )
            .watches(api(&client), Config::default(), |switch| peer_switches(&switch))
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!(name = %obj.name, "Reconciled Switch"),
                    Err(e) => debug!(error = %e, "Reconcile error"),
                }
            })
            .await;
    }
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// The Switch an Inventory describes: its switch label, else the same name.
fn inventory_owner(inventory: &Inventory) -> Option<ObjectRef<Switch>> {
    let name = inventory
        .labels()
        .get(SWITCH_LABEL)
        .cloned()
        .unwrap_or_else(|| inventory.name_any());
    Some(ObjectRef::new(&name).within(&inventory.namespace()?))
}

/// Pool reservations name their switch through the switch label.
fn labelled_owner<K: Resource>(obj: &K) -> Option<ObjectRef<Switch>> {
    let name = obj.labels().get(SWITCH_LABEL)?;
    Some(ObjectRef::new(name).within(&obj.namespace()?))
}

/// Switches that read the pool `obj`: its labelled owner, plus every cached
/// switch in the same namespace whose selector matches the pool's labels.
fn pool_owners<K: Resource>(
    obj: &K,
    switches: &[Arc<Switch>],
    selector: fn(&Switch) -> BTreeMap<String, String>,
) -> Vec<ObjectRef<Switch>> {
    let mut owners: Vec<ObjectRef<Switch>> = labelled_owner(obj).into_iter().collect();
    let namespace = obj.namespace();
    let labels = obj.labels();
    for switch in switches {
        if switch.namespace() != namespace {
            continue;
        }
        let matches = selector(switch)
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v));
        let owner = ObjectRef::from_obj(switch.as_ref());
        if matches && !owners.contains(&owner) {
            owners.push(owner);
        }
    }
    owners
}

/// Switches linked to `switch`; their levels and directions may depend on it.
fn peer_switches(switch: &Switch) -> Vec<ObjectRef<Switch>> {
    let Some(status) = &switch.status else {
        return Vec::new();
    };
    let own_namespace = switch.namespace().unwrap_or_default();
    status
        .interfaces
        .values()
        .filter_map(|iface| iface.peer_switch())
        .map(|peer| {
            let ns = peer.namespace.as_deref().unwrap_or(&own_namespace);
            ObjectRef::new(&peer.name).within(ns)
        })
        .collect()
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Step whose increment was persisted, if any.
    pub step: Option<&'static str>,
    pub requeue_after: Duration,
}

/// Load everything the pipeline reads for `switch`.
async fn load_snapshot(
    switch: &Switch,
    ctx: &Context,
) -> Result<(PassContext, Vec<Switch>), ReconcileError> {
    let namespace = switch.namespace().unwrap_or_default();
    let repository = &ctx.repository;

    let switches = repository.list_switches().await?;
    let inventory = repository
        .get_inventory(&switch.inventory_name(), &namespace)
        .await?;
    let subnets = repository
        .list_subnets(&namespace, &switch.south_subnet_selector())
        .await?;
    let ips = repository
        .list_ips(&namespace, &switch.loopback_selector())
        .await?;

    let pass = PassContext {
        switch: switch.identity(),
        nics: inventory.map(|inv| inv.spec.nics),
        population: switches.iter().map(Switch::record).collect(),
        pools: PoolSnapshot {
            south_subnets: subnets.iter().map(Subnet::pool_entry).collect(),
            loopbacks: ips.iter().filter_map(Ip::pool_entry).collect(),
        },
        settings: ctx.settings.clone(),
        now: Utc::now(),
    };
    Ok((pass, switches))
}

fn record_state_gauge(switches: &[Switch]) {
    let mut counts: BTreeMap<&'static str, usize> =
        BTreeMap::from([("initial", 0), ("processing", 0), ("ready", 0)]);
    for switch in switches {
        let state = match switch.status.as_ref().and_then(|s| s.state) {
            Some(SwitchState::Processing) => "processing",
            Some(SwitchState::Ready) => "ready",
            Some(SwitchState::Initial) | None => "initial",
        };
        *counts.entry(state).or_default() += 1;
    }
    for (state, count) in counts {
        metrics::set_switches_by_state(state, count);
    }
}

/// What an idle, unconverged switch is most likely waiting for.
fn waiting_on(pass: &PassContext, status: &SwitchStatus) -> &'static str {
    if pass.nics.is_none() {
        "inventory"
    } else if !status.is_level_resolved() {
        "peer levels"
    } else if pass.pools.south_subnets.is_empty() || pass.pools.loopbacks.is_empty() {
        "address pools"
    } else {
        "peer addresses"
    }
}

fn emit_transition_events(name: &str, before: &SwitchStatus, after: &SwitchStatus) {
    if before.connection_level != after.connection_level {
        events::switch_level_resolved(name, before.connection_level, after.connection_level);
    }
    if !before.is_ready() && after.is_ready() {
        let role = after.role.map(|r| r.to_string()).unwrap_or_default();
        events::switch_ready(name, &role, after.connection_level, after.asn);
    }
    if before.configuration.manager_state != ManagerState::Failed
        && after.configuration.manager_state == ManagerState::Failed
    {
        let last_check = after
            .configuration
            .last_check
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        events::configuration_liveness_failed(name, &last_check);
    }
}

/// One reconciliation pass for `switch`, independent of the controller
/// runtime.
pub async fn reconcile_switch(switch: &Switch, ctx: &Context) -> Result<PassReport, ReconcileError> {
    let name = switch.name_any();
    let namespace = switch.namespace().unwrap_or_default();

    let (pass, population) = load_snapshot(switch, ctx).await?;
    record_state_gauge(&population);

    let current = switch.status.clone().unwrap_or_default();
    let outcome = ctx.pipeline.run_pass(&pass, &current)?;

    let step = match &outcome {
        PassOutcome::Changed { step, status } => {
            let patch = status_patch(switch, status)?;
            ctx.repository
                .patch_switch_status(&name, &namespace, patch)
                .await?;
            events::switch_status_advanced(&name, &namespace, step);
            metrics::record_step_advanced(step);
            emit_transition_events(&name, &current, status);
            Some(*step)
        }
        PassOutcome::Unchanged => {
            if !current.is_ready() {
                events::prerequisite_pending(&name, waiting_on(&pass, &current));
            }
            None
        }
    };

    let persisted = match &outcome {
        PassOutcome::Changed { status, .. } => status,
        PassOutcome::Unchanged => &current,
    };
    Ok(PassReport {
        step,
        requeue_after: ctx.requeue.next(&outcome, persisted),
    })
}

fn backoff_key(switch: &Switch) -> String {
    format!("{}/{}", switch.namespace().unwrap_or_default(), switch.name_any())
}

#[instrument(skip(switch, ctx), fields(name = %switch.name_any()))]
async fn reconcile(switch: Arc<Switch>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let result = reconcile_switch(&switch, &ctx).await;

    let outcome = match &result {
        Ok(report) if report.step.is_some() => "changed",
        Ok(_) => "unchanged",
        Err(e) => e.kind(),
    };
    metrics::record_reconcile(outcome, started.elapsed());

    let report = result?;
    ctx.reset_backoff(&backoff_key(&switch));
    Ok(Action::requeue(report.requeue_after))
}

fn error_policy(switch: Arc<Switch>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    let name = switch.name_any();
    match error {
        ReconcileError::Conflict(message) => {
            debug!(name = %name, message = %message, "Status write conflicted, retrying");
            Action::requeue(Duration::ZERO)
        }
        e if e.is_validation() => {
            events::switch_validation_failed(&name, &e.to_string());
            Action::requeue(ctx.requeue.retry_interval)
        }
        ReconcileError::Fabric(e) => {
            let delay = ctx.next_backoff(&backoff_key(&switch));
            warn!(name = %name, error = %e, retry_in = ?delay, "Malformed input, backing off");
            Action::requeue(delay)
        }
        e => {
            let delay = ctx.next_backoff(&backoff_key(&switch));
            error!(name = %name, error = %e, retry_in = ?delay, "Reconcile failed");
            Action::requeue(delay)
        }
    }
}

/// Log the switches the controller starts with. Returns the number found.
pub async fn log_population(ctx: &Context) -> Result<usize, ReconcileError> {
    let switches = ctx.repository.list_switches().await?;
    info!(count = switches.len(), "Switch population loaded");
    Ok(switches.len())
}
