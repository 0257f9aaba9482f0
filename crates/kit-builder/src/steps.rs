//! Default steps shared by every publish strategy.

use crate::step::{Step, StepPhase};

pub const CLEAN_BUILD_DIR: Step = Step::new("builder/clean-build-dir", StepPhase::Init);
pub const GENERATE_PROJECT: Step = Step::new("builder/generate-project", StepPhase::ProjectGeneration);
pub const INJECT_DEPENDENCIES: Step = Step::new("builder/inject-dependencies", StepPhase::ProjectGeneration);
pub const SANITIZE_DEPENDENCIES: Step = Step::new("builder/sanitize-dependencies", StepPhase::ProjectGeneration);
pub const COMPUTE_DEPENDENCIES: Step = Step::new("builder/compute-dependencies", StepPhase::ProjectBuild);
pub const INCREMENTAL_PACKAGER: Step = Step::new("builder/incremental-packager", StepPhase::ApplicationPackage);

/// Steps every pipeline starts with, in execution order.
pub const DEFAULT_STEPS: &[Step] = &[
    CLEAN_BUILD_DIR,
    GENERATE_PROJECT,
    INJECT_DEPENDENCIES,
    SANITIZE_DEPENDENCIES,
    COMPUTE_DEPENDENCIES,
    INCREMENTAL_PACKAGER,
];
