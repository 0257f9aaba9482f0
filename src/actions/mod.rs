//! Kit action dispatch
//!
//! Each pass looks at the Kit's phase and runs the first action whose
//! predicate holds. Predicates partition the phases, so at most one action
//! runs per pass; phases no action handles (Ready, Error) are no-ops.
//!
//! | phase | action |
//! |---|---|
//! | `""` | initialize |
//! | BuildSubmitted, BuildRunning | build |
//! | Ready, Error | none |

mod build;
mod initialize;
mod replace;

pub use replace::{replace, ReplaceError};

use std::sync::Arc;

use kit_api::{Kit, KitPhase, ObjectKey, Resource};
use tracing::{debug, info};

use crate::compose::{ComposeError, Composer};
use crate::context::{Cancelled, ReconcileContext, EXIT_CODE_CANCELLED};
use crate::digest::DigestError;
use crate::notify::NotifyError;
use crate::owner::OwnerError;
use crate::platform::PlatformError;
use crate::store::{get_optional, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Initialize,
    Build,
}

impl Action {
    /// Dispatch order.
    pub const ALL: [Action; 2] = [Action::Initialize, Action::Build];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Initialize => "initialize",
            Action::Build => "build",
        }
    }

    pub fn can_handle(&self, phase: KitPhase) -> bool {
        match self {
            Action::Initialize => phase == KitPhase::None,
            Action::Build => matches!(phase, KitPhase::BuildSubmitted | KitPhase::BuildRunning),
        }
    }

    /// The first action accepting `phase`.
    pub fn for_phase(phase: KitPhase) -> Option<Action> {
        Self::ALL.iter().copied().find(|a| a.can_handle(phase))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("digest error: {0}")]
    Digest(#[from] DigestError),

    #[error("owner reference error: {0}")]
    Owner(#[from] OwnerError),

    #[error(transparent)]
    Replace(#[from] ReplaceError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("undefined runtime catalog for kit {kit}")]
    MissingCatalog { kit: ObjectKey },

    #[error("found kit {kit} not in the expected phase (expected={expected}, found={found})")]
    PhaseConflict {
        kit: ObjectKey,
        expected: KitPhase,
        found: KitPhase,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ActionError {
    /// Whether the pass ended because the context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ActionError::Cancelled(_)
                | ActionError::Compose(ComposeError::Cancelled(_))
                | ActionError::Replace(ReplaceError::Interrupted { .. })
                | ActionError::Notify(NotifyError::Cancelled { .. })
        )
    }

    /// Whether another pass may succeed without outside changes.
    pub fn is_retryable(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self {
            ActionError::Store(_)
            | ActionError::Platform(PlatformError::Store(_))
            | ActionError::Compose(ComposeError::Platform(PlatformError::Store(_)))
            | ActionError::Replace(_)
            | ActionError::Notify(_)
            | ActionError::PhaseConflict { .. } => true,
            _ => false,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            return EXIT_CODE_CANCELLED;
        }
        match self {
            ActionError::Store(_) | ActionError::Platform(_) => 20,
            ActionError::Compose(_) | ActionError::MissingCatalog { .. } => 30,
            ActionError::Replace(_) => 40,
            ActionError::Notify(_) => 50,
            ActionError::PhaseConflict { .. } => 60,
            ActionError::Digest(_) | ActionError::Owner(_) => 1,
            ActionError::Cancelled(_) => EXIT_CODE_CANCELLED,
        }
    }
}

/// Result of one reconcile pass over a Kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The Kit no longer exists.
    Gone,
    /// No action handles the Kit's phase.
    Idle,
    Ran(Action),
}

/// Runs actions against Kits read from a store.
#[derive(Debug)]
pub struct KitReconciler<S, C> {
    store: Arc<S>,
    composer: C,
    operator_version: String,
}

impl<S: Store, C: Composer> KitReconciler<S, C> {
    pub fn new(store: Arc<S>, composer: C, operator_version: impl Into<String>) -> Self {
        Self {
            store,
            composer,
            operator_version: operator_version.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn operator_version(&self) -> &str {
        &self.operator_version
    }

    /// Run the action matching `kit`'s phase, if any.
    pub fn handle(&self, ctx: &ReconcileContext, kit: &Kit) -> Result<Option<Action>, ActionError> {
        let Some(action) = Action::for_phase(kit.status.phase) else {
            debug!(kit = %kit.key(), phase = %kit.status.phase, "no action for phase");
            return Ok(None);
        };

        debug!(kit = %kit.key(), action = action.name(), "invoking action");
        match action {
            Action::Initialize => self.initialize(ctx, kit)?,
            Action::Build => self.build(ctx, kit)?,
        }
        Ok(Some(action))
    }

    /// Read the Kit at `key` and run one pass over it.
    pub fn reconcile(&self, ctx: &ReconcileContext, key: &ObjectKey) -> Result<Outcome, ActionError> {
        let Some(kit) = get_optional::<S, Kit>(self.store(), key)? else {
            debug!(kit = %key, "kit not found");
            return Ok(Outcome::Gone);
        };

        Ok(match self.handle(ctx, &kit)? {
            Some(action) => Outcome::Ran(action),
            None => Outcome::Idle,
        })
    }
}

/// Set the phase on `kit` and log the transition.
pub(crate) fn transition(kit: &mut Kit, phase: KitPhase) {
    let from = kit.status.phase;
    kit.status.phase = phase;
    info!(kit = %kit.key(), from = %from, phase = %phase, "kit state transition");
}
