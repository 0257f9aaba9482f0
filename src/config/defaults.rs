//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Version stamped into every Kit digest (default: crate version)
    pub operator_version: String,

    /// Namespace reconciled by the CLI (default: "default")
    pub namespace: String,

    /// Retries per key per pass (default: 5)
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds (default: 100)
    pub retry_backoff_ms: u64,

    /// Backoff cap in milliseconds (default: 5000)
    pub retry_backoff_max_ms: u64,

    /// Kits reconciled in parallel (default: 4)
    pub max_concurrent_reconciles: usize,

    /// Passes before giving up on settling (default: 32)
    pub max_passes: u32,

    /// Default tracing filter (default: "info")
    pub log_filter: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            operator_version: env!("CARGO_PKG_VERSION").to_string(),
            namespace: "default".to_string(),
            max_retries: 5,
            retry_backoff_ms: 100,
            retry_backoff_max_ms: 5000,
            max_concurrent_reconciles: 4,
            max_passes: 32,
            log_filter: "info".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "operator_version": self.operator_version,
            "namespace": self.namespace,
            "max_retries": self.max_retries,
            "retry_backoff_ms": self.retry_backoff_ms,
            "retry_backoff_max_ms": self.retry_backoff_max_ms,
            "max_concurrent_reconciles": self.max_concurrent_reconciles,
            "max_passes": self.max_passes,
            "log_filter": self.log_filter
        })
    }
}
