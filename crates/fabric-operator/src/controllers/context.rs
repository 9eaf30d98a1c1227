//! Shared controller context

use crate::config::OperatorConfig;
use crate::repository::FabricRepository;
use fabric_core::{standard_pipeline, EngineSettings, Pipeline, RequeuePolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Context {
    pub repository: Arc<dyn FabricRepository>,
    pub pipeline: Pipeline,
    pub settings: EngineSettings,
    pub requeue: RequeuePolicy,
    pub config: OperatorConfig,
    /// Consecutive failures per `namespace/name`.
    failures: Mutex<HashMap<String, u32>>,
}

impl Context {
    pub fn new(repository: Arc<dyn FabricRepository>, config: OperatorConfig) -> Self {
        Self {
            repository,
            pipeline: standard_pipeline(),
            settings: config.engine_settings(),
            requeue: config.requeue_policy(),
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure and return how long to wait before retrying:
    /// `error_backoff_base` doubled per consecutive failure, capped at
    /// `error_backoff_max`.
    pub fn next_backoff(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(key.to_string()).or_insert(0);
        let exponent = (*count).min(16);
        *count = count.saturating_add(1);
        self.config
            .error_backoff_base
            .saturating_mul(1 << exponent)
            .min(self.config.error_backoff_max)
    }

    pub fn reset_backoff(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryRepository;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let ctx = Context::new(Arc::new(MemoryRepository::default()), OperatorConfig::default());
        let delays: Vec<u64> = (0..8).map(|_| ctx.next_backoff("fabric/leaf-1").as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);

        // Independent per switch.
        assert_eq!(ctx.next_backoff("fabric/leaf-2").as_secs(), 5);

        ctx.reset_backoff("fabric/leaf-1");
        assert_eq!(ctx.next_backoff("fabric/leaf-1").as_secs(), 5);
    }
}
