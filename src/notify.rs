//! Dependent notification
//!
//! When a Kit becomes ready every Integration bound to it (exact name match on
//! `status.kit`) is moved to `ResolvingKit`. Updates run one at a time; the
//! first failure stops the walk and the error says which Integrations were
//! already moved. Re-running after a failure is safe.

use kit_api::{Integration, IntegrationPhase, Kit, ObjectKey, Resource};
use tracing::{debug, info};

use crate::context::{Cancelled, ReconcileContext};
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("cannot list integrations in namespace {namespace}: {source}")]
    List {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot update integration {failed} for kit {kit} (already updated: {updated:?}): {source}")]
    Update {
        kit: ObjectKey,
        failed: String,
        updated: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("notification for kit {kit} stopped (already updated: {updated:?}): {cause}")]
    Cancelled {
        kit: ObjectKey,
        updated: Vec<String>,
        cause: Cancelled,
    },
}

impl NotifyError {
    /// Integrations moved before the walk stopped.
    pub fn updated(&self) -> &[String] {
        match self {
            NotifyError::List { .. } => &[],
            NotifyError::Update { updated, .. } | NotifyError::Cancelled { updated, .. } => updated,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub updated: Vec<String>,
}

/// Move every Integration bound to `kit` to `ResolvingKit`.
pub fn notify_dependents<S: Store>(
    ctx: &ReconcileContext,
    store: &S,
    kit: &Kit,
) -> Result<NotifyReport, NotifyError> {
    let namespace = &kit.metadata.namespace;
    let integrations: Vec<Integration> =
        store.list(namespace).map_err(|source| NotifyError::List {
            namespace: namespace.clone(),
            source,
        })?;

    let mut report = NotifyReport::default();
    for mut integration in integrations.into_iter().filter(|i| i.uses_kit(kit.name())) {
        if let Err(cause) = ctx.check() {
            return Err(NotifyError::Cancelled {
                kit: kit.key(),
                updated: report.updated,
                cause,
            });
        }

        let name = integration.metadata.name.clone();
        integration.status.phase = IntegrationPhase::ResolvingKit;
        if let Err(source) = store.update_status(&integration) {
            return Err(NotifyError::Update {
                kit: kit.key(),
                failed: name,
                updated: report.updated,
                source,
            });
        }
        debug!(kit = %kit.key(), integration = %name, "integration moved to ResolvingKit");
        report.updated.push(name);
    }

    info!(kit = %kit.key(), updated = report.updated.len(), "informed integrations about kit state change");
    Ok(report)
}
