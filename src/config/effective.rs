//! Effective configuration with provenance
//!
//! The merged configuration plus the layers it came from. File layers record
//! the SHA-256 of their raw bytes so a run can be traced to the exact file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::operator::OperatorConfig;

/// Upper bound on `max_concurrent_reconciles`
const MAX_CONCURRENCY: u64 = 64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// One contributing layer.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigLayer {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Hex SHA-256 of the file as read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ConfigLayer {
    fn inline(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            sha256: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub loaded_at: DateTime<Utc>,
    pub config: Value,
    /// Lowest precedence first
    pub layers: Vec<ConfigLayer>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl EffectiveConfig {
    /// Merge built-in defaults, an optional TOML file and CLI overrides.
    ///
    /// A named file that does not exist is an error.
    pub fn build(config_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut values = vec![BuiltinDefaults::default().to_value()];
        let mut layers = vec![ConfigLayer::inline(ConfigOrigin::Builtin)];

        if let Some(path) = config_path {
            let (value, sha256) = read_toml(path)?;
            values.push(value);
            layers.push(ConfigLayer {
                origin: ConfigOrigin::File,
                path: Some(path.to_path_buf()),
                sha256: Some(sha256),
            });
        }

        if let Some(cli) = cli_overrides {
            values.push(cli);
            layers.push(ConfigLayer::inline(ConfigOrigin::Cli));
        }

        let config = merge_layers(values);
        if let Some(problem) = first_problem(&config) {
            return Err(ConfigError::Invalid(problem));
        }

        Ok(Self {
            loaded_at: Utc::now(),
            config,
            layers,
        })
    }

    /// Typed view of the merged object.
    pub fn operator_config(&self) -> Result<OperatorConfig, ConfigError> {
        serde_json::from_value(self.config.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn read_toml(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::str::from_utf8(&bytes).map_err(|e| parse_error(e.to_string()))?;
    let value: Value = toml::from_str(contents).map_err(|e| parse_error(e.to_string()))?;
    Ok((value, sha256))
}

/// First range or consistency violation in the merged config, if any.
///
/// Type mismatches are left to [`EffectiveConfig::operator_config`].
fn first_problem(config: &Value) -> Option<String> {
    let number = |key: &str| config.get(key).and_then(Value::as_u64);

    if let Some(n) = number("max_concurrent_reconciles") {
        if n == 0 || n > MAX_CONCURRENCY {
            return Some(format!("max_concurrent_reconciles must be in [1, {MAX_CONCURRENCY}], got {n}"));
        }
    }
    if number("max_passes") == Some(0) {
        return Some("max_passes must be at least 1".to_string());
    }
    if let (Some(backoff), Some(cap)) = (number("retry_backoff_ms"), number("retry_backoff_max_ms")) {
        if backoff > cap {
            return Some(format!(
                "retry_backoff_ms ({backoff}) exceeds retry_backoff_max_ms ({cap})"
            ));
        }
    }
    if config.get("namespace").and_then(Value::as_str) == Some("") {
        return Some("namespace must not be empty".to_string());
    }
    None
}
