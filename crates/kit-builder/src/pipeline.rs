//! Publisher selection and pipeline assembly.

use kit_api::{ClusterType, PublishStrategy};
use thiserror::Error;

use crate::step::{Step, StepPhase};
use crate::{kaniko, s2i, steps};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("publish strategy {strategy} is not supported on {cluster} clusters")]
    UnsupportedStrategy {
        cluster: ClusterType,
        strategy: PublishStrategy,
    },

    #[error("pipeline must contain exactly one publish step, found {0}")]
    PublisherCount(usize),

    #[error("step {step} runs after a later phase ({previous})")]
    OutOfOrder { step: String, previous: StepPhase },
}

/// An ordered step sequence plus the working directory it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub strategy: PublishStrategy,
    pub steps: Vec<Step>,
    pub build_dir: Option<String>,
}

impl Pipeline {
    /// The step occupying the `ApplicationPublish` slot.
    pub fn publisher(&self) -> Option<Step> {
        self.steps
            .iter()
            .copied()
            .find(|s| s.phase() == StepPhase::ApplicationPublish)
    }

    /// Check the structural invariants: one publisher, phases never go backwards.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_steps(&self.steps)
    }
}

/// Check that a step sequence has exactly one publisher and monotonic phases.
pub fn validate_steps(steps: &[Step]) -> Result<(), PipelineError> {
    let publishers = steps
        .iter()
        .filter(|s| s.phase() == StepPhase::ApplicationPublish)
        .count();
    if publishers != 1 {
        return Err(PipelineError::PublisherCount(publishers));
    }

    for pair in steps.windows(2) {
        if pair[1].phase() < pair[0].phase() {
            return Err(PipelineError::OutOfOrder {
                step: pair[1].id().to_string(),
                previous: pair[0].phase(),
            });
        }
    }

    Ok(())
}

/// Pick the publish strategy for a cluster.
///
/// An explicit strategy wins; otherwise OpenShift defaults to S2I and
/// Kubernetes to Kaniko. S2I needs the OpenShift build API.
pub fn resolve_strategy(
    cluster: ClusterType,
    configured: Option<PublishStrategy>,
) -> Result<PublishStrategy, PipelineError> {
    let strategy = configured.unwrap_or(match cluster {
        ClusterType::OpenShift => PublishStrategy::S2i,
        ClusterType::Kubernetes => PublishStrategy::Kaniko,
    });

    if cluster == ClusterType::Kubernetes && strategy == PublishStrategy::S2i {
        return Err(PipelineError::UnsupportedStrategy { cluster, strategy });
    }

    Ok(strategy)
}

/// Assemble the full pipeline for a cluster and configured strategy.
pub fn pipeline_for(
    cluster: ClusterType,
    configured: Option<PublishStrategy>,
) -> Result<Pipeline, PipelineError> {
    let strategy = resolve_strategy(cluster, configured)?;

    let mut pipeline = Pipeline {
        strategy,
        steps: steps::DEFAULT_STEPS.to_vec(),
        build_dir: None,
    };

    match strategy {
        PublishStrategy::Kaniko => {
            pipeline.steps.extend_from_slice(kaniko::STEPS);
            pipeline.build_dir = Some(kaniko::BUILD_DIR.to_string());
        }
        PublishStrategy::S2i => {
            pipeline.steps.extend_from_slice(s2i::STEPS);
        }
    }

    pipeline.validate()?;
    Ok(pipeline)
}
