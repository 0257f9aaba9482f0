//! Kit resource and its phase state machine
//!
//! Kit phases: "" → BUILD_SUBMITTED → BUILD_RUNNING → {READY | ERROR}
//! with a direct "" → READY edge for Kits that name a pre-built image.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::build::{Artifact, Failure};
use crate::error::ParseError;
use crate::meta::{impl_resource, ObjectMeta};

/// Kit phase enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KitPhase {
    /// Newly created, not yet initialized
    #[default]
    #[serde(rename = "")]
    None,
    /// A Build has been (or is about to be) submitted
    BuildSubmitted,
    /// The Build was observed running
    BuildRunning,
    /// The image is available
    Ready,
    /// The Build failed
    Error,
}

impl KitPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            KitPhase::None => "",
            KitPhase::BuildSubmitted => "BuildSubmitted",
            KitPhase::BuildRunning => "BuildRunning",
            KitPhase::Ready => "Ready",
            KitPhase::Error => "Error",
        }
    }

    /// Ready and Error are only left through an external spec change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, KitPhase::Ready | KitPhase::Error)
    }

    /// Check if transition from this phase to target is valid
    pub fn can_transition_to(&self, target: KitPhase) -> bool {
        matches!(
            (self, target),
            (KitPhase::None, KitPhase::BuildSubmitted)
                | (KitPhase::None, KitPhase::Ready)
                | (KitPhase::BuildSubmitted, KitPhase::BuildRunning)
                | (KitPhase::BuildRunning, KitPhase::Ready)
                | (KitPhase::BuildRunning, KitPhase::Error)
        )
    }
}

impl fmt::Display for KitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KitPhase::None => write!(f, "<none>"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for KitPhase {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(KitPhase::None),
            "BuildSubmitted" => Ok(KitPhase::BuildSubmitted),
            "BuildRunning" => Ok(KitPhase::BuildRunning),
            "Ready" => Ok(KitPhase::Ready),
            "Error" => Ok(KitPhase::Error),
            _ => Err(ParseError::new("kit phase", s)),
        }
    }
}

/// A typed configuration entry (e.g. a property or environment variable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitSpec {
    /// Pre-built image; when set and non-blank the Kit is never built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigurationSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitStatus {
    #[serde(default)]
    pub phase: KitPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_image: Option<String>,

    /// Content digest over the finalized spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Built artifacts; never carries a storage location
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    /// Name of the platform the Kit was composed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kit {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: KitSpec,
    #[serde(default)]
    pub status: KitStatus,
}

impl_resource!(Kit, "Kit");

impl Kit {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Self::default()
        }
    }

    pub fn with_dependencies<I, D>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.spec.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = Some(image.into());
        self
    }

    pub fn with_phase(mut self, phase: KitPhase) -> Self {
        self.status.phase = phase;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
