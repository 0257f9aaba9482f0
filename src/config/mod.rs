//! Layered operator configuration
//!
//! Three layers, later ones winning:
//! 1. Built-in defaults
//! 2. TOML config file (`--config`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;
mod operator;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigLayer, ConfigOrigin, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
pub use operator::OperatorConfig;
