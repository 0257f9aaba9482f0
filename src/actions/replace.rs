//! Two-phase replace: delete the old object, then create the new one.
//!
//! Between the two calls the object does not exist. A pass that stops inside
//! that window (cancellation, crash, failed create) leaves nothing behind, and
//! the next pass sees "absent" and creates it. Callers must treat absence as
//! the repair signal.

use kit_api::{ObjectKey, Resource};
use tracing::debug;

use crate::context::{Cancelled, ReconcileContext};
use crate::store::{delete_if_exists, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    #[error("cannot delete {kind} {key}: {source}")]
    Delete {
        kind: &'static str,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("cannot create {kind} {key}: {source}")]
    Create {
        kind: &'static str,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("replace of {kind} {key} interrupted after delete: {cause}")]
    Interrupted {
        kind: &'static str,
        key: ObjectKey,
        cause: Cancelled,
    },
}

impl ReplaceError {
    /// Whether the old object is already gone.
    pub fn left_absent(&self) -> bool {
        !matches!(self, ReplaceError::Delete { .. })
    }
}

/// Replace `object` in the store, returning the created copy.
pub fn replace<S: Store, R: Resource>(
    ctx: &ReconcileContext,
    store: &S,
    object: &R,
) -> Result<R, ReplaceError> {
    let key = object.key();

    let deleted = delete_if_exists::<S, R>(store, &key).map_err(|source| ReplaceError::Delete {
        kind: R::KIND,
        key: key.clone(),
        source,
    })?;
    debug!(kind = R::KIND, key = %key, deleted, "replace: old object removed");

    ctx.check().map_err(|cause| ReplaceError::Interrupted {
        kind: R::KIND,
        key: key.clone(),
        cause,
    })?;

    store.create(object).map_err(|source| ReplaceError::Create {
        kind: R::KIND,
        key,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailureConfig, InMemoryStore, Operation};
    use kit_api::{Build, BuildPhase};

    #[test]
    fn test_replace_creates_when_absent() {
        let store = InMemoryStore::new();
        let created = replace(&ReconcileContext::new(), &store, &Build::new("ns", "b")).unwrap();
        assert!(!created.metadata.uid.is_empty());
        assert_eq!(store.count_writes(Operation::Delete, "Build"), 0);
    }

    #[test]
    fn test_replace_recreates() {
        let store = InMemoryStore::new();
        let mut old = Build::new("ns", "b");
        old.status.phase = BuildPhase::Error;
        let old = store.create(&old).unwrap();
        let old = store.update_status(&old).unwrap();

        let created = replace(&ReconcileContext::new(), &store, &Build::new("ns", "b")).unwrap();

        assert_ne!(created.metadata.uid, old.metadata.uid);
        let stored: Build = store.get(&created.key()).unwrap();
        assert_eq!(stored.status.phase, BuildPhase::None);
    }

    #[test]
    fn test_failed_create_leaves_absent() {
        let store = InMemoryStore::new();
        store.create(&Build::new("ns", "b")).unwrap();
        store.inject_failure(Operation::Create, "Build", FailureConfig::error("crash"));

        let err = replace(&ReconcileContext::new(), &store, &Build::new("ns", "b")).unwrap_err();

        assert!(matches!(err, ReplaceError::Create { .. }));
        assert!(err.left_absent());
        assert!(store
            .get::<Build>(&ObjectKey::new("ns", "b"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_failed_delete_keeps_old() {
        let store = InMemoryStore::new();
        store.create(&Build::new("ns", "b")).unwrap();
        store.inject_failure(Operation::Delete, "Build", FailureConfig::error("busy"));

        let err = replace(&ReconcileContext::new(), &store, &Build::new("ns", "b")).unwrap_err();

        assert!(!err.left_absent());
        assert_eq!(store.count_writes(Operation::Create, "Build"), 1);
    }
}
