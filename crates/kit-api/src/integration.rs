//! Integration resource. The build core only ever touches `status.phase`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::meta::{impl_resource, ObjectMeta};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Initialization,
    BuildingKit,
    ResolvingKit,
    Deploying,
    Running,
    Error,
}

impl fmt::Display for IntegrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrationPhase::None => "<none>",
            IntegrationPhase::Initialization => "Initialization",
            IntegrationPhase::BuildingKit => "BuildingKit",
            IntegrationPhase::ResolvingKit => "ResolvingKit",
            IntegrationPhase::Deploying => "Deploying",
            IntegrationPhase::Running => "Running",
            IntegrationPhase::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSpec {
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatus {
    #[serde(default)]
    pub phase: IntegrationPhase,

    /// Name of the Kit this integration runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: IntegrationSpec,
    #[serde(default)]
    pub status: IntegrationStatus,
}

impl_resource!(Integration, "Integration");

impl Integration {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Self::default()
        }
    }

    /// Bind to a Kit and set the phase, as the integration controller would.
    pub fn bound_to(mut self, kit: impl Into<String>, phase: IntegrationPhase) -> Self {
        self.status.kit = Some(kit.into());
        self.status.phase = phase;
        self
    }

    /// Whether the recorded Kit reference is exactly `kit_name`.
    pub fn uses_kit(&self, kit_name: &str) -> bool {
        self.status.kit.as_deref() == Some(kit_name)
    }
}
