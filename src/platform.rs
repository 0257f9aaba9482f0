//! Current-platform lookup

use kit_api::{Platform, PlatformPhase};
use tracing::debug;

use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("no platform in namespace {namespace}")]
    NotFound { namespace: String },

    #[error("platform {name} is not ready (phase {phase})")]
    NotReady { name: String, phase: PlatformPhase },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PlatformError {
    /// Missing or warming platforms are waited for, not reported.
    pub fn is_soft(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. } | PlatformError::NotReady { .. })
    }
}

/// The platform Kits in `namespace` build against.
///
/// The first ready platform by name wins; if none is ready the first one is
/// reported as not ready.
pub fn current_platform<S: Store>(store: &S, namespace: &str) -> Result<Platform, PlatformError> {
    let platforms: Vec<Platform> = store.list(namespace)?;

    if let Some(ready) = platforms.iter().find(|p| p.is_ready()) {
        debug!(namespace, platform = %ready.metadata.name, "using platform");
        return Ok(ready.clone());
    }

    match platforms.into_iter().next() {
        Some(p) => Err(PlatformError::NotReady {
            name: p.metadata.name,
            phase: p.status.phase,
        }),
        None => Err(PlatformError::NotFound {
            namespace: namespace.to_string(),
        }),
    }
}
