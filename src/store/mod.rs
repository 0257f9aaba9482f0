//! Resource store contract
//!
//! Typed get/list/create/update/delete keyed by (namespace, name) with
//! optimistic concurrency on writes. `update` writes metadata and spec and
//! keeps the stored status; `update_status` writes the status only. Both are
//! rejected when the caller's `resource_version` is stale.

mod failure;
mod memory;

pub use failure::{FailureConfig, FailureInjector};
pub use memory::{InMemoryStore, JournalEntry};

pub use kit_api::{ObjectKey, Resource};

/// Store operations, used for failure injection and the write journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

impl Operation {
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Get | Operation::List)
    }
}

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    #[error("conflict writing {kind} {key}: resource version {given} is stale (current {current})")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        given: u64,
        current: u64,
    },

    #[error("{op:?} {kind} failed: {message}")]
    Injected {
        op: Operation,
        kind: &'static str,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed resource store.
pub trait Store: Send + Sync {
    fn get<R: Resource>(&self, key: &ObjectKey) -> StoreResult<R>;

    /// All resources of a kind in a namespace, ordered by name.
    fn list<R: Resource>(&self, namespace: &str) -> StoreResult<Vec<R>>;

    fn create<R: Resource>(&self, object: &R) -> StoreResult<R>;

    fn update<R: Resource>(&self, object: &R) -> StoreResult<R>;

    fn update_status<R: Resource>(&self, object: &R) -> StoreResult<R>;

    fn delete<R: Resource>(&self, key: &ObjectKey) -> StoreResult<()>;
}

/// Get a resource, mapping not-found to `None`.
pub fn get_optional<S: Store, R: Resource>(
    store: &S,
    key: &ObjectKey,
) -> StoreResult<Option<R>> {
    match store.get(key) {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete a resource, treating not-found as success.
///
/// Returns whether something was deleted.
pub fn delete_if_exists<S: Store, R: Resource>(
    store: &S,
    key: &ObjectKey,
) -> StoreResult<bool> {
    match store.delete::<R>(key) {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
