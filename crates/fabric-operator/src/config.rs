//! Operator Configuration
//!
//! Defaults with environment variable overrides. Flags on `fabric-operator
//! run` are applied on top of this by the binary.

use fabric_core::{AddressFamily, EngineSettings, RequeuePolicy};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace to watch (env: FABRIC_NAMESPACE). `None` watches all.
    pub namespace: Option<String>,

    /// Probe and metrics listener (env: BIND_ADDR)
    pub bind_addr: SocketAddr,

    /// Families a switch must be addressed in (env: FABRIC_ADDRESS_FAMILIES, comma-separated)
    pub families: Vec<AddressFamily>,

    // Requeue cadence
    pub change_requeue: Duration,
    /// env: FABRIC_RETRY_SECS
    pub retry_interval: Duration,
    /// env: FABRIC_LIVENESS_SECS
    pub liveness_interval: Duration,
    pub resync_interval: Duration,

    /// Age of `lastCheck` after which the agent is failed (env: FABRIC_LIVENESS_THRESHOLD_SECS)
    pub liveness_threshold: Duration,

    // Error backoff, doubled per consecutive failure
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        let requeue = RequeuePolicy::default();
        Self {
            namespace: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            families: AddressFamily::ALL.to_vec(),
            change_requeue: requeue.change_requeue,
            retry_interval: requeue.retry_interval,
            liveness_interval: requeue.liveness_interval,
            resync_interval: requeue.resync_interval,
            liveness_threshold: Duration::from_secs(300),
            error_backoff_base: Duration::from_secs(5),
            error_backoff_max: Duration::from_secs(300),
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values are logged
    /// and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(namespace) = lookup("FABRIC_NAMESPACE").filter(|ns| !ns.is_empty()) {
            config.namespace = Some(namespace);
        }

        if let Some(addr) = lookup("BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(e) => warn!(value = %addr, error = %e, "ignoring invalid BIND_ADDR"),
            }
        }

        if let Some(families) = lookup("FABRIC_ADDRESS_FAMILIES") {
            let parsed = parse_families(&families);
            if parsed.is_empty() {
                warn!(value = %families, "no valid address family, keeping defaults");
            } else {
                config.families = parsed;
            }
        }

        let secs = |key: &str, target: &mut Duration| {
            if let Some(value) = lookup(key) {
                match value.parse::<u64>() {
                    Ok(n) if n > 0 => *target = Duration::from_secs(n),
                    _ => warn!(key, value = %value, "ignoring invalid duration"),
                }
            }
        };
        secs("FABRIC_RETRY_SECS", &mut config.retry_interval);
        secs("FABRIC_LIVENESS_SECS", &mut config.liveness_interval);
        secs("FABRIC_LIVENESS_THRESHOLD_SECS", &mut config.liveness_threshold);

        config
    }

    pub fn requeue_policy(&self) -> RequeuePolicy {
        RequeuePolicy {
            change_requeue: self.change_requeue,
            retry_interval: self.retry_interval,
            liveness_interval: self.liveness_interval,
            resync_interval: self.resync_interval,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            families: self.families.clone(),
            liveness_threshold: chrono::Duration::from_std(self.liveness_threshold)
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
        }
    }
}

fn parse_families(value: &str) -> Vec<AddressFamily> {
    let mut families = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match AddressFamily::from_str(&item.to_ascii_lowercase()) {
            Ok(family) if !families.contains(&family) => families.push(family),
            Ok(_) => {}
            Err(_) => warn!(value = %item, "unknown address family"),
        }
    }
    families
}
