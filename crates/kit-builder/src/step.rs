use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase tag of a build step. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepPhase {
    Init,
    ProjectGeneration,
    ProjectBuild,
    ApplicationPackage,
    ApplicationPublish,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepPhase::Init => "Init",
            StepPhase::ProjectGeneration => "ProjectGeneration",
            StepPhase::ProjectBuild => "ProjectBuild",
            StepPhase::ApplicationPackage => "ApplicationPackage",
            StepPhase::ApplicationPublish => "ApplicationPublish",
        };
        write!(f, "{}", s)
    }
}

/// An immutable, named pipeline stage.
///
/// Only the identifier is persisted in a Build; behavior belongs to the
/// executor that interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    id: &'static str,
    phase: StepPhase,
}

impl Step {
    pub const fn new(id: &'static str, phase: StepPhase) -> Self {
        Self { id, phase }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.phase)
    }
}

/// Project steps to their identifiers, preserving order.
pub fn step_ids_for(steps: &[Step]) -> Vec<String> {
    steps.iter().map(|s| s.id.to_string()).collect()
}
