//! Platform resource: cluster flavor, registry and publish settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::meta::{impl_resource, ObjectMeta};

/// Cluster flavor the platform runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterType {
    #[default]
    Kubernetes,
    OpenShift,
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterType::Kubernetes => write!(f, "Kubernetes"),
            ClusterType::OpenShift => write!(f, "OpenShift"),
        }
    }
}

impl FromStr for ClusterType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kubernetes" => Ok(ClusterType::Kubernetes),
            "openshift" => Ok(ClusterType::OpenShift),
            _ => Err(ParseError::new("cluster type", s)),
        }
    }
}

/// Mechanism used to assemble and push the final image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishStrategy {
    Kaniko,
    #[serde(rename = "S2I")]
    S2i,
}

impl fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStrategy::Kaniko => write!(f, "Kaniko"),
            PublishStrategy::S2i => write!(f, "S2I"),
        }
    }
}

impl FromStr for PublishStrategy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kaniko" => Ok(PublishStrategy::Kaniko),
            "s2i" => Ok(PublishStrategy::S2i),
            _ => Err(ParseError::new("publish strategy", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformBuildSpec {
    /// Unset means "derive from the cluster flavor"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_strategy: Option<PublishStrategy>,

    #[serde(default)]
    pub registry: RegistrySpec,

    /// Semver requirement on the catalog version, e.g. "^3.0"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<String>,

    /// Pin to an exact runtime version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSpec {
    #[serde(default)]
    pub cluster: ClusterType,
    #[serde(default)]
    pub build: PlatformBuildSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Creating,
    Warming,
    Ready,
    Error,
}

impl fmt::Display for PlatformPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlatformPhase::None => "<none>",
            PlatformPhase::Creating => "Creating",
            PlatformPhase::Warming => "Warming",
            PlatformPhase::Ready => "Ready",
            PlatformPhase::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    #[serde(default)]
    pub phase: PlatformPhase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PlatformSpec,
    #[serde(default)]
    pub status: PlatformStatus,
}

impl_resource!(Platform, "Platform");

impl Platform {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Self::default()
        }
    }

    pub fn with_cluster(mut self, cluster: ClusterType) -> Self {
        self.spec.cluster = cluster;
        self
    }

    pub fn with_strategy(mut self, strategy: PublishStrategy) -> Self {
        self.spec.build.publish_strategy = Some(strategy);
        self
    }

    pub fn with_registry(mut self, address: impl Into<String>) -> Self {
        self.spec.build.registry.address = address.into();
        self
    }

    pub fn with_phase(mut self, phase: PlatformPhase) -> Self {
        self.status.phase = phase;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status.phase == PlatformPhase::Ready
    }
}
