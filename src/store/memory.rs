//! In-memory resource store
//!
//! Holds every object as JSON so that spec and status writes can be applied
//! independently, the way a cluster API server treats the status subresource.
//! Deleting an object cascades to everything that lists it as an owner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::failure::{FailureConfig, FailureInjector};
use super::{ObjectKey, Operation, Resource, Store, StoreError, StoreResult};

type ObjectId = (&'static str, ObjectKey);

/// A write recorded by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub op: Operation,
    pub kind: &'static str,
    pub key: ObjectKey,
}

#[derive(Debug, Default)]
struct Objects {
    items: BTreeMap<ObjectId, Value>,
    last_version: u64,
}

impl Objects {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

/// Thread-safe in-memory store with optimistic concurrency
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: Mutex<Objects>,
    failures: Mutex<FailureInjector>,
    journal: Mutex<Vec<JournalEntry>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_field(target: &mut Value, field: &str, value: Value) {
    if let Some(map) = target.as_object_mut() {
        map.insert(field.to_string(), value);
    }
}

fn owner_uids(value: &Value) -> Vec<String> {
    value
        .pointer("/metadata/owner_references")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(|r| r.get("uid").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn uid_of(value: &Value) -> Option<String> {
    value
        .pointer("/metadata/uid")
        .and_then(Value::as_str)
        .filter(|uid| !uid.is_empty())
        .map(str::to_string)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object as-is, keeping its metadata.
    ///
    /// Used to load snapshots and fixtures. A missing uid is generated and the
    /// store's version counter is moved past the object's resource version.
    pub fn seed<R: Resource>(&self, object: &R) -> StoreResult<R> {
        let mut seeded = object.clone();
        let mut objects = lock(&self.objects);

        let meta = seeded.meta_mut();
        if meta.uid.is_empty() {
            meta.uid = Uuid::new_v4().to_string();
        }
        if meta.resource_version == 0 {
            meta.resource_version = objects.next_version();
        } else {
            objects.last_version = objects.last_version.max(meta.resource_version);
        }
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(Utc::now());
        }

        let value = serde_json::to_value(&seeded)?;
        objects.items.insert((R::KIND, seeded.key()), value);
        Ok(seeded)
    }

    /// Every object of a kind across all namespaces.
    pub fn list_all<R: Resource>(&self) -> StoreResult<Vec<R>> {
        let objects = lock(&self.objects);
        objects
            .items
            .iter()
            .filter(|((kind, _), _)| *kind == R::KIND)
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }

    /// Namespaces that hold at least one object of the kind.
    pub fn namespaces<R: Resource>(&self) -> BTreeSet<String> {
        let objects = lock(&self.objects);
        objects
            .items
            .keys()
            .filter(|(kind, _)| *kind == R::KIND)
            .map(|(_, key)| key.namespace.clone())
            .collect()
    }

    /// Inject a failure for an operation on a kind
    pub fn inject_failure(&self, op: Operation, kind: &'static str, config: FailureConfig) {
        lock(&self.failures).inject(op, kind, config);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// All writes performed so far, in order.
    pub fn journal(&self) -> Vec<JournalEntry> {
        lock(&self.journal).clone()
    }

    /// Number of journaled writes of one operation on one kind.
    pub fn count_writes(&self, op: Operation, kind: &str) -> usize {
        lock(&self.journal)
            .iter()
            .filter(|e| e.op == op && e.kind == kind)
            .count()
    }

    pub fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    fn fail_if_injected(&self, op: Operation, kind: &'static str) -> StoreResult<()> {
        match lock(&self.failures).check(op, kind) {
            Some(message) => Err(StoreError::Injected { op, kind, message }),
            None => Ok(()),
        }
    }

    fn record(&self, op: Operation, kind: &'static str, key: ObjectKey) {
        lock(&self.journal).push(JournalEntry { op, kind, key });
    }

    fn check_version<R: Resource>(stored: &Value, object: &R) -> StoreResult<()> {
        let current = stored
            .pointer("/metadata/resource_version")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let given = object.meta().resource_version;
        if given != current {
            return Err(StoreError::Conflict {
                kind: R::KIND,
                key: object.key(),
                given,
                current,
            });
        }
        Ok(())
    }
}

impl Store for InMemoryStore {
    fn get<R: Resource>(&self, key: &ObjectKey) -> StoreResult<R> {
        self.fail_if_injected(Operation::Get, R::KIND)?;

        let objects = lock(&self.objects);
        let value = objects
            .items
            .get(&(R::KIND, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind: R::KIND,
                key: key.clone(),
            })?;
        Ok(serde_json::from_value(value.clone())?)
    }

    fn list<R: Resource>(&self, namespace: &str) -> StoreResult<Vec<R>> {
        self.fail_if_injected(Operation::List, R::KIND)?;

        let objects = lock(&self.objects);
        objects
            .items
            .iter()
            .filter(|((kind, key), _)| *kind == R::KIND && key.namespace == namespace)
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }

    fn create<R: Resource>(&self, object: &R) -> StoreResult<R> {
        self.fail_if_injected(Operation::Create, R::KIND)?;

        let key = object.key();
        let mut objects = lock(&self.objects);
        let id = (R::KIND, key.clone());
        if objects.items.contains_key(&id) {
            return Err(StoreError::AlreadyExists { kind: R::KIND, key });
        }

        let mut created = object.clone();
        let version = objects.next_version();
        let meta = created.meta_mut();
        meta.uid = Uuid::new_v4().to_string();
        meta.resource_version = version;
        meta.generation = 1;
        meta.creation_timestamp = Some(Utc::now());

        objects.items.insert(id, serde_json::to_value(&created)?);
        drop(objects);

        self.record(Operation::Create, R::KIND, key);
        Ok(created)
    }

    fn update<R: Resource>(&self, object: &R) -> StoreResult<R> {
        self.fail_if_injected(Operation::Update, R::KIND)?;

        let key = object.key();
        let mut objects = lock(&self.objects);
        let id = (R::KIND, key.clone());
        let current = objects
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: R::KIND,
                key: key.clone(),
            })?;
        Self::check_version(&current, object)?;
        let stored: R = serde_json::from_value(current.clone())?;

        let mut next = serde_json::to_value(object)?;
        let spec_changed = next.get("spec") != current.get("spec");
        set_field(
            &mut next,
            "status",
            current.get("status").cloned().unwrap_or(Value::Null),
        );

        let mut updated: R = serde_json::from_value(next)?;
        let version = objects.next_version();
        let meta = updated.meta_mut();
        meta.uid = stored.meta().uid.clone();
        meta.creation_timestamp = stored.meta().creation_timestamp;
        meta.resource_version = version;
        meta.generation = stored.meta().generation + u64::from(spec_changed);

        objects.items.insert(id, serde_json::to_value(&updated)?);
        drop(objects);

        self.record(Operation::Update, R::KIND, key);
        Ok(updated)
    }

    fn update_status<R: Resource>(&self, object: &R) -> StoreResult<R> {
        self.fail_if_injected(Operation::UpdateStatus, R::KIND)?;

        let key = object.key();
        let mut objects = lock(&self.objects);
        let id = (R::KIND, key.clone());
        let mut next = objects
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: R::KIND,
                key: key.clone(),
            })?;
        Self::check_version(&next, object)?;

        let status = serde_json::to_value(object)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        set_field(&mut next, "status", status);

        let mut updated: R = serde_json::from_value(next)?;
        updated.meta_mut().resource_version = objects.next_version();

        objects.items.insert(id, serde_json::to_value(&updated)?);
        drop(objects);

        self.record(Operation::UpdateStatus, R::KIND, key);
        Ok(updated)
    }

    fn delete<R: Resource>(&self, key: &ObjectKey) -> StoreResult<()> {
        self.fail_if_injected(Operation::Delete, R::KIND)?;

        let mut objects = lock(&self.objects);
        let removed = objects
            .items
            .remove(&(R::KIND, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind: R::KIND,
                key: key.clone(),
            })?;

        let mut deleted = vec![(R::KIND, key.clone())];
        let mut gone_uids: Vec<String> = uid_of(&removed).into_iter().collect();

        // Cascade to dependents, transitively
        while let Some(uid) = gone_uids.pop() {
            let dependents: Vec<ObjectId> = objects
                .items
                .iter()
                .filter(|(_, value)| owner_uids(value).contains(&uid))
                .map(|(id, _)| id.clone())
                .collect();

            for id in dependents {
                if let Some(value) = objects.items.remove(&id) {
                    gone_uids.extend(uid_of(&value));
                    deleted.push(id);
                }
            }
        }
        drop(objects);

        for (kind, key) in deleted {
            self.record(Operation::Delete, kind, key);
        }
        Ok(())
    }
}
