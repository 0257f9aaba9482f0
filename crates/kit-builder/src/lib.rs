//! Build step catalog for Kit builds.
//!
//! A build pipeline is an ordered list of [`Step`]s. Each step carries exactly
//! one [`StepPhase`] tag; exactly one step is tagged `ApplicationPublish`, and
//! which publisher fills that slot depends on the cluster flavor and the
//! configured publish strategy.

mod pipeline;
mod step;

pub mod kaniko;
pub mod s2i;
pub mod steps;

pub use pipeline::{pipeline_for, resolve_strategy, validate_steps, Pipeline, PipelineError};
pub use step::{step_ids_for, Step, StepPhase};

/// Every step this crate knows about, defaults first.
pub const ALL_STEPS: &[Step] = &[
    steps::CLEAN_BUILD_DIR,
    steps::GENERATE_PROJECT,
    steps::INJECT_DEPENDENCIES,
    steps::SANITIZE_DEPENDENCIES,
    steps::COMPUTE_DEPENDENCIES,
    steps::INCREMENTAL_PACKAGER,
    kaniko::PUBLISHER,
    s2i::PUBLISHER,
];

/// Look up a step by identifier.
pub fn lookup(id: &str) -> Option<Step> {
    ALL_STEPS.iter().copied().find(|s| s.id() == id)
}
