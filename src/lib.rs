//! Kit build orchestration core
//!
//! Turns Kits into container images through a pluggable step pipeline and
//! tells dependent Integrations when a Kit is ready.
//!
//! - [`actions`]: phase-gated dispatch of the initialize and build actions
//! - [`compose`]: per-pass environment and step pipeline composition
//! - [`notify`]: fan-out to dependent Integrations
//! - [`store`]: resource store contract and its in-memory implementation
//! - [`controller`]: the outer loop that serializes passes per Kit and retries
//! - [`simulator`]: stand-in for the external build engine

pub mod actions;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod context;
pub mod controller;
pub mod digest;
pub mod notify;
pub mod owner;
pub mod platform;
pub mod simulator;
pub mod snapshot;
pub mod store;

pub use actions::{Action, ActionError, KitReconciler, Outcome, ReplaceError};
pub use compose::{CatalogComposer, Composer, ComposeError, Environment, Target};
pub use config::{EffectiveConfig, OperatorConfig};
pub use context::ReconcileContext;
pub use controller::{Controller, ControllerConfig, ControllerError};
pub use notify::{notify_dependents, NotifyError, NotifyReport};
pub use simulator::BuildSimulator;
pub use snapshot::Snapshot;
pub use store::{InMemoryStore, Store, StoreError};
