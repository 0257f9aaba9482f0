//! Controller owner references
//!
//! An object has at most one controlling owner, living in the same namespace.
//! The store deletes dependents when their owner goes away.

use kit_api::{OwnerReference, Resource};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnerError {
    #[error("{owner_kind} {owner} has no uid; it must be read from the store first")]
    MissingUid { owner_kind: &'static str, owner: String },

    #[error("cross-namespace owner reference: {owner} cannot own {object}")]
    CrossNamespace { owner: String, object: String },

    #[error("{object} is already controlled by {kind} {name}")]
    AlreadyOwned {
        object: String,
        kind: String,
        name: String,
    },
}

/// Build the controller reference pointing at `owner`.
pub fn controller_reference<O: Resource>(owner: &O) -> Result<OwnerReference, OwnerError> {
    let meta = owner.meta();
    if meta.uid.is_empty() {
        return Err(OwnerError::MissingUid {
            owner_kind: O::KIND,
            owner: owner.key().to_string(),
        });
    }
    Ok(OwnerReference {
        api_version: kit_api::API_VERSION.to_string(),
        kind: O::KIND.to_string(),
        name: meta.name.clone(),
        uid: meta.uid.clone(),
        controller: true,
        block_owner_deletion: true,
    })
}

/// Make `owner` the controller of `object`.
///
/// An existing reference to the same owner is replaced. A different
/// controlling owner is an error.
pub fn set_controller_reference<O: Resource, R: Resource>(
    owner: &O,
    object: &mut R,
) -> Result<(), OwnerError> {
    let reference = controller_reference(owner)?;

    if owner.meta().namespace != object.meta().namespace {
        return Err(OwnerError::CrossNamespace {
            owner: owner.key().to_string(),
            object: object.key().to_string(),
        });
    }

    let object_key = object.key().to_string();
    let meta = object.meta_mut();
    if let Some(existing) = meta.controller() {
        if existing.uid != reference.uid {
            return Err(OwnerError::AlreadyOwned {
                object: object_key,
                kind: existing.kind.clone(),
                name: existing.name.clone(),
            });
        }
    }

    meta.owner_references.retain(|r| r.uid != reference.uid);
    meta.owner_references.push(reference);
    Ok(())
}
