//! Build resource
//!
//! A Build is a one-shot attempt to turn a Kit into an image. Its spec is a
//! snapshot taken at submission time and never changes afterwards; its status
//! is written by the external build executor only.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::{impl_resource, ObjectMeta};
use crate::platform::PlatformSpec;

/// Build phase enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Initialization,
    Scheduling,
    Pending,
    Running,
    Succeeded,
    Interrupted,
    Error,
    /// Any phase this version does not recognise
    #[serde(other)]
    Unknown,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::None => "",
            BuildPhase::Initialization => "Initialization",
            BuildPhase::Scheduling => "Scheduling",
            BuildPhase::Pending => "Pending",
            BuildPhase::Running => "Running",
            BuildPhase::Succeeded => "Succeeded",
            BuildPhase::Interrupted => "Interrupted",
            BuildPhase::Error => "Error",
            BuildPhase::Unknown => "Unknown",
        }
    }

    /// Terminal builds are never resumed; a new Build replaces them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildPhase::Succeeded | BuildPhase::Interrupted | BuildPhase::Error
        )
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPhase::None => write!(f, "<none>"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// An artifact produced by a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,

    /// Storage location inside the build environment
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    /// Path of the artifact inside the image
    pub target: String,
}

impl Artifact {
    pub fn new(id: impl Into<String>, location: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            target: target.into(),
        }
    }

    /// Copy without the storage location.
    pub fn without_location(&self) -> Self {
        Self {
            id: self.id.clone(),
            location: String::new(),
            target: self.target.clone(),
        }
    }
}

/// Structured failure detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: String,
    pub time: DateTime<Utc>,
}

impl Failure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Metadata of the owning Kit at submission time
    pub meta: ObjectMeta,

    pub catalog_version: String,

    pub runtime_version: String,

    /// Platform settings at submission time
    pub platform: PlatformSpec,

    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ordered step identifiers; order is execution order
    #[serde(default)]
    pub steps: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    #[serde(default)]
    pub phase: BuildPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BuildSpec,
    #[serde(default)]
    pub status: BuildStatus,
}

impl_resource!(Build, "Build");

impl Build {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_phase_terminal() {
        assert!(!BuildPhase::None.is_terminal());
        assert!(!BuildPhase::Pending.is_terminal());
        assert!(!BuildPhase::Running.is_terminal());
        assert!(BuildPhase::Succeeded.is_terminal());
        assert!(BuildPhase::Interrupted.is_terminal());
        assert!(BuildPhase::Error.is_terminal());
        assert!(!BuildPhase::Unknown.is_terminal());
    }

    #[test]
    fn test_unrecognised_phase_deserializes_as_unknown() {
        let build: Build = serde_json::from_value(serde_json::json!({
            "metadata": {"namespace": "ns", "name": "kit-a"},
            "status": {"phase": "Cancelled"}
        }))
        .unwrap();

        assert_eq!(build.status.phase, BuildPhase::Unknown);
        assert!(!build.status.phase.is_terminal());
    }

    #[test]
    fn test_artifact_without_location() {
        let artifact = Artifact::new("a", "/tmp/a", "t");
        let stripped = artifact.without_location();

        assert_eq!(stripped.id, "a");
        assert_eq!(stripped.location, "");
        assert_eq!(stripped.target, "t");

        let json = serde_json::to_value(&stripped).unwrap();
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_build_status_defaults_when_missing() {
        let build: Build = serde_json::from_value(serde_json::json!({
            "metadata": {"namespace": "ns", "name": "kit-a"}
        }))
        .unwrap();

        assert_eq!(build.status.phase, BuildPhase::None);
        assert!(build.spec.steps.is_empty());
    }
}
