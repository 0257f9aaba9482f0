//! First-time setup of a new Kit.

use kit_api::{Kit, KitPhase, Resource};
use tracing::{debug, info};

use super::{transition, ActionError, KitReconciler};
use crate::compose::{Composer, Target};
use crate::context::ReconcileContext;
use crate::digest;
use crate::platform::current_platform;
use crate::store::Store;

impl<S: Store, C: Composer> KitReconciler<S, C> {
    /// Compose and persist the Kit spec, then decide between building and
    /// reusing a pre-built image.
    ///
    /// Until the namespace has a ready platform this is a no-op.
    pub(crate) fn initialize(&self, ctx: &ReconcileContext, kit: &Kit) -> Result<(), ActionError> {
        match current_platform(self.store(), &kit.metadata.namespace) {
            Ok(_) => {}
            Err(e) if e.is_soft() => {
                info!(kit = %kit.key(), reason = %e, "waiting for the platform to be initialized");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let mut target = kit.clone();
        let env = self
            .composer
            .compose(ctx, self.store(), None, Target::Kit(&mut target))?;
        debug!(
            kit = %kit.key(),
            dependencies = target.spec.dependencies.len(),
            runtime = env.runtime_version.as_deref().unwrap_or("<none>"),
            "kit composed"
        );

        // The spec write leaves status untouched; carry the composed status over
        let composed_status = target.status.clone();
        ctx.check()?;
        info!(kit = %kit.key(), "updating kit");
        let mut target = self.store.update(&target)?;
        target.status = composed_status;

        // A blank image means there is nothing pre-built to reuse
        match target.spec.image.clone().filter(|i| !i.trim().is_empty()) {
            Some(image) => {
                target.status.image = Some(image);
                transition(&mut target, KitPhase::Ready);
            }
            None => transition(&mut target, KitPhase::BuildSubmitted),
        }

        target.status.digest = Some(digest::compute_for_kit(&self.operator_version, &target)?);

        ctx.check()?;
        self.store.update_status(&target)?;
        Ok(())
    }
}
