//! Simulated build executor
//!
//! Plays the part of the external build engine: it walks each Build through a
//! phase progression, one step per call, and writes the status an engine
//! would write. Used by integration tests and `kitctl reconcile --simulate`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use kit_api::{Artifact, Build, BuildPhase, Failure, Resource};
use kit_builder::{lookup, validate_steps, Step};
use tracing::{debug, info};

use crate::store::{Store, StoreError};

/// Default registry when the platform names none
pub const DEFAULT_REGISTRY: &str = "registry.local";

/// Where the simulated engine keeps built artifacts
pub const ARTIFACT_ROOT: &str = "/tmp/artifacts";

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Advances Builds through configurable phase progressions.
#[derive(Debug)]
pub struct BuildSimulator {
    default_progression: Vec<BuildPhase>,
    /// Per-build overrides, keyed by build name
    progressions: Mutex<HashMap<String, Vec<BuildPhase>>>,
    /// Builds pinned to a phase until released
    held: Mutex<HashMap<String, BuildPhase>>,
}

impl Default for BuildSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSimulator {
    /// Pending, Running, then Succeeded.
    pub fn new() -> Self {
        Self::with_progression(vec![
            BuildPhase::Pending,
            BuildPhase::Running,
            BuildPhase::Succeeded,
        ])
    }

    pub fn with_progression(progression: Vec<BuildPhase>) -> Self {
        Self {
            default_progression: progression,
            progressions: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Override the progression of one build
    pub fn set_progression(&self, build: &str, phases: Vec<BuildPhase>) {
        let mut progressions = self.progressions.lock().unwrap_or_else(PoisonError::into_inner);
        progressions.insert(build.to_string(), phases);
    }

    /// Keep a build from advancing past `phase`
    pub fn hold(&self, build: &str, phase: BuildPhase) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.insert(build.to_string(), phase);
    }

    pub fn release(&self, build: &str) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(build);
    }

    fn progression_for(&self, build: &str) -> Vec<BuildPhase> {
        let progressions = self.progressions.lock().unwrap_or_else(PoisonError::into_inner);
        progressions
            .get(build)
            .cloned()
            .unwrap_or_else(|| self.default_progression.clone())
    }

    fn is_held(&self, build: &str, phase: BuildPhase) -> bool {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.get(build) == Some(&phase)
    }

    /// Phase the build moves to next, if any.
    fn next_phase(&self, build: &Build) -> Option<BuildPhase> {
        let current = build.status.phase;
        if current.is_terminal() || self.is_held(&build.metadata.name, current) {
            return None;
        }

        let progression = self.progression_for(&build.metadata.name);
        match progression.iter().position(|p| *p == current) {
            Some(i) => progression.get(i + 1).copied(),
            None => progression.first().copied(),
        }
    }

    /// Advance every non-terminal Build in `namespace` by one phase.
    ///
    /// Returns the number of Builds that changed.
    pub fn advance_all<S: Store>(&self, store: &S, namespace: &str) -> Result<usize, SimulatorError> {
        let builds: Vec<Build> = store.list(namespace)?;
        let mut advanced = 0;
        for build in &builds {
            if self.advance(store, build)?.is_some() {
                advanced += 1;
            }
        }
        Ok(advanced)
    }

    /// Advance one Build, returning its new phase.
    pub fn advance<S: Store>(&self, store: &S, build: &Build) -> Result<Option<BuildPhase>, SimulatorError> {
        let Some(next) = self.next_phase(build) else {
            return Ok(None);
        };

        let mut target = build.clone();
        if let Err(reason) = resolve_steps(&build.spec.steps) {
            target.status.phase = BuildPhase::Error;
            target.status.error = Some(reason.clone());
            target.status.failure = Some(Failure::new(reason));
        } else {
            target.status.phase = next;
            match next {
                BuildPhase::Succeeded => finish(&mut target),
                BuildPhase::Error => {
                    target.status.error = Some("simulated build failure".to_string());
                }
                BuildPhase::Interrupted => {
                    target.status.error = Some("build interrupted".to_string());
                }
                _ => {}
            }
        }

        let updated = store.update_status(&target)?;
        if updated.status.phase.is_terminal() {
            info!(build = %updated.key(), phase = %updated.status.phase, "simulated build finished");
        } else {
            debug!(build = %updated.key(), phase = %updated.status.phase, "simulated build advanced");
        }
        Ok(Some(updated.status.phase))
    }
}

/// Resolve step ids against the catalog and check the pipeline shape.
fn resolve_steps(ids: &[String]) -> Result<Vec<Step>, String> {
    let steps = ids
        .iter()
        .map(|id| lookup(id).ok_or_else(|| format!("unknown build step {}", id)))
        .collect::<Result<Vec<_>, _>>()?;
    validate_steps(&steps).map_err(|e| e.to_string())?;
    Ok(steps)
}

/// Image reference a successful build publishes.
pub fn image_for(build: &Build) -> String {
    let registry = &build.spec.platform.build.registry;
    let address = if registry.address.is_empty() {
        DEFAULT_REGISTRY
    } else {
        registry.address.as_str()
    };
    let organization = registry
        .organization
        .as_deref()
        .unwrap_or(&build.metadata.namespace);
    format!(
        "{}/{}/kit-{}:{}",
        address, organization, build.metadata.name, build.metadata.resource_version
    )
}

fn finish(build: &mut Build) {
    let image = image_for(build);
    build.status.base_image = build.spec.platform.build.base_image.clone();
    build.status.public_image = Some(image.clone());
    build.status.image = Some(image);
    build.status.artifacts = build
        .spec
        .dependencies
        .iter()
        .map(|dep| {
            let file = format!("{}.jar", dep.replace(':', "."));
            Artifact::new(
                dep.clone(),
                format!("{}/{}", ARTIFACT_ROOT, file),
                format!("dependencies/{}", file),
            )
        })
        .collect();
}
