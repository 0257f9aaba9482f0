//! Typed view of the merged configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub operator_version: String,
    pub namespace: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub max_concurrent_reconciles: usize,
    pub max_passes: u32,
    pub log_filter: String,
}

impl OperatorConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms)
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        let defaults = super::BuiltinDefaults::default();
        Self {
            operator_version: defaults.operator_version,
            namespace: defaults.namespace,
            max_retries: defaults.max_retries,
            retry_backoff_ms: defaults.retry_backoff_ms,
            retry_backoff_max_ms: defaults.retry_backoff_max_ms,
            max_concurrent_reconciles: defaults.max_concurrent_reconciles,
            max_passes: defaults.max_passes,
            log_filter: defaults.log_filter,
        }
    }
}
