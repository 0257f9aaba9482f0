//! Kit API Types
//!
//! Defines the resources exchanged between the build orchestration core, the
//! resource store and the external build executor:
//! - `Kit`: a buildable unit whose output is a container image
//! - `Build`: a one-shot attempt to turn a Kit into an image
//! - `Platform`: cluster-wide build settings (read-only input)
//! - `Integration`: a deployable unit that references a Kit by name

pub mod build;
pub mod error;
pub mod integration;
pub mod kit;
pub mod meta;
pub mod platform;

pub use build::{Artifact, Build, BuildPhase, BuildSpec, BuildStatus, Failure};
pub use error::ParseError;
pub use integration::{Integration, IntegrationPhase, IntegrationSpec, IntegrationStatus};
pub use kit::{ConfigurationSpec, Kit, KitPhase, KitSpec, KitStatus};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference, Resource};
pub use platform::{
    ClusterType, Platform, PlatformBuildSpec, PlatformPhase, PlatformSpec, PlatformStatus,
    PublishStrategy, RegistrySpec,
};

/// API group/version stamped on owner references.
pub const API_VERSION: &str = "kit.build/v1alpha1";
