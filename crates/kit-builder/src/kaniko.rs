//! Kaniko publisher: builds and pushes the image from inside a pod.

use crate::step::{Step, StepPhase};

pub const PUBLISHER: Step = Step::new("kaniko/publisher", StepPhase::ApplicationPublish);

/// Shared volume the Kaniko executor reads the build context from.
pub const BUILD_DIR: &str = "/workspace";

pub const STEPS: &[Step] = &[PUBLISHER];
