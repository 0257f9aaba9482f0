//! Build submission and monitoring.
//!
//! BuildSubmitted: make sure exactly one non-terminal Build exists for the
//! Kit, replacing absent or finished ones, and advance to BuildRunning once
//! the executor reports it running.
//!
//! BuildRunning: wait for the Build to finish and copy its outcome into the
//! Kit status. Build failures are recorded, not returned as errors.

use kit_api::{Build, BuildPhase, BuildSpec, Failure, Kit, KitPhase, Resource};
use tracing::{debug, error, info};

use super::replace::replace;
use super::{transition, ActionError, KitReconciler};
use crate::compose::{Composer, Target};
use crate::context::ReconcileContext;
use crate::notify::notify_dependents;
use crate::owner::set_controller_reference;
use crate::store::{get_optional, Store};

/// Whether a (possibly absent) Build must be (re)submitted.
///
/// Unset and other in-flight phases are left alone.
pub(crate) fn needs_submission(build: Option<&Build>) -> bool {
    match build {
        None => true,
        Some(b) => matches!(
            b.status.phase,
            BuildPhase::Error | BuildPhase::Interrupted | BuildPhase::Succeeded
        ),
    }
}

impl<S: Store, C: Composer> KitReconciler<S, C> {
    pub(crate) fn build(&self, ctx: &ReconcileContext, kit: &Kit) -> Result<(), ActionError> {
        match kit.status.phase {
            KitPhase::BuildSubmitted => self.handle_build_submitted(ctx, kit),
            KitPhase::BuildRunning => self.handle_build_running(ctx, kit),
            _ => Ok(()),
        }
    }

    fn handle_build_submitted(&self, ctx: &ReconcileContext, kit: &Kit) -> Result<(), ActionError> {
        let mut observed = get_optional::<S, Build>(self.store(), &kit.key())?;

        if needs_submission(observed.as_ref()) {
            let build = self.new_build(ctx, kit)?;

            ctx.check()?;
            let created = replace(ctx, self.store(), &build)?;
            info!(
                kit = %kit.key(),
                build = %created.key(),
                steps = created.spec.steps.len(),
                "build submitted"
            );
            observed = Some(created);
        }

        if observed.map(|b| b.status.phase) == Some(BuildPhase::Running) {
            let mut target = kit.clone();
            transition(&mut target, KitPhase::BuildRunning);

            ctx.check()?;
            self.store.update_status(&target)?;
        }

        Ok(())
    }

    /// Compose a fresh Build for `kit`, owned by it.
    fn new_build(&self, ctx: &ReconcileContext, kit: &Kit) -> Result<Build, ActionError> {
        let mut target = kit.clone();
        let env = self
            .composer
            .compose(ctx, self.store(), None, Target::Kit(&mut target))?;

        let Some((catalog, runtime_version)) = env.resolved_runtime() else {
            return Err(ActionError::MissingCatalog { kit: kit.key() });
        };

        let mut build = Build::new(kit.metadata.namespace.clone(), kit.metadata.name.clone());
        build.spec = BuildSpec {
            meta: kit.metadata.clone(),
            catalog_version: catalog.version.clone(),
            runtime_version: runtime_version.to_string(),
            platform: env.platform.spec.clone(),
            dependencies: target.spec.dependencies.clone(),
            steps: env.step_ids(),
            build_dir: env.build_dir.clone(),
        };

        set_controller_reference(kit, &mut build)?;
        Ok(build)
    }

    fn handle_build_running(&self, ctx: &ReconcileContext, kit: &Kit) -> Result<(), ActionError> {
        let build: Build = self.store.get(&kit.key())?;

        match build.status.phase {
            BuildPhase::Running => {
                debug!(kit = %kit.key(), "build running");
            }
            BuildPhase::Succeeded => {
                let mut target = self.current_running_kit(kit)?;

                target.status.base_image = build.status.base_image.clone();
                target.status.image = build.status.image.clone();
                target.status.public_image = build.status.public_image.clone();
                target.status.artifacts = build
                    .status
                    .artifacts
                    .iter()
                    .map(|a| a.without_location())
                    .collect();
                transition(&mut target, KitPhase::Ready);

                ctx.check()?;
                let ready = self.store.update_status(&target)?;

                let report = notify_dependents(ctx, self.store(), &ready)?;
                debug!(kit = %kit.key(), integrations = ?report.updated, "dependents notified");
            }
            BuildPhase::Error | BuildPhase::Interrupted => {
                let mut target = self.current_running_kit(kit)?;

                let reason = build
                    .status
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("build {}", build.status.phase));
                target.status.failure = Some(
                    build
                        .status
                        .failure
                        .clone()
                        .unwrap_or_else(|| Failure::new(reason.clone())),
                );
                error!(kit = %kit.key(), build_phase = %build.status.phase, error = %reason, "build failed");
                transition(&mut target, KitPhase::Error);

                ctx.check()?;
                self.store.update_status(&target)?;
            }
            other => {
                debug!(kit = %kit.key(), build_phase = %other, "build not started yet");
            }
        }

        Ok(())
    }

    /// Re-read the Kit and make sure it is still BuildRunning.
    ///
    /// Someone may have changed the Kit since this pass started; finalizing
    /// against a different phase would overwrite their change.
    fn current_running_kit(&self, kit: &Kit) -> Result<Kit, ActionError> {
        let current: Kit = self.store.get(&kit.key())?;
        if current.status.phase != KitPhase::BuildRunning {
            return Err(ActionError::PhaseConflict {
                kit: kit.key(),
                expected: KitPhase::BuildRunning,
                found: current.status.phase,
            });
        }
        Ok(current)
    }
}
