//! Generic keyed object storage
//!
//! Every kind in the mock is stored as `(namespace, name) -> object` and
//! shares the same create/replace/delete semantics.

use super::helpers::{lock, matches_selector};
use super::MockStateStore;
use crate::error::StoreError;
use kube::Resource;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub(crate) type ObjectKey = (String, String);
pub(crate) type Objects<K> = Arc<Mutex<BTreeMap<ObjectKey, K>>>;

pub(crate) fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

pub(crate) fn object_name<K: Resource>(obj: &K) -> Result<String, StoreError> {
    obj.meta().name.clone()
        .ok_or_else(|| StoreError::Invalid("object is missing metadata.name".to_string()))
}

pub(crate) fn get<K: Resource + Clone>(objects: &Objects<K>, namespace: &str, name: &str) -> Option<K> {
    lock(objects).get(&key(namespace, name)).cloned()
}

pub(crate) fn list<K: Resource + Clone>(objects: &Objects<K>, namespace: &str, label_selector: &str) -> Vec<K> {
    lock(objects)
        .iter()
        .filter(|((ns, _), _)| ns == namespace)
        .filter(|(_, obj)| matches_selector(obj.meta().labels.as_ref(), label_selector))
        .map(|(_, obj)| obj.clone())
        .collect()
}

/// Stores a new object, stamping server-owned metadata the way the API server does.
pub(crate) fn create<K: Resource + Clone>(
    store: &MockStateStore,
    objects: &Objects<K>,
    namespace: &str,
    obj: &K,
) -> Result<K, StoreError> {
    let name = object_name(obj)?;
    let mut objects = lock(objects);
    if objects.contains_key(&key(namespace, &name)) {
        return Err(StoreError::AlreadyExists(format!("{}/{}", namespace, name)));
    }

    let mut stored = obj.clone();
    let meta = stored.meta_mut();
    meta.namespace = Some(namespace.to_string());
    meta.uid = Some(uuid::Uuid::new_v4().to_string());
    meta.resource_version = Some(store.next_revision());
    meta.generation = Some(1);

    objects.insert(key(namespace, &name), stored.clone());
    Ok(stored)
}

/// Replaces an object if the caller's resourceVersion is current.
///
/// `validate` sees `(existing, incoming)` and may reject the write, e.g. for
/// immutable fields.
pub(crate) fn replace<K, F>(
    store: &MockStateStore,
    objects: &Objects<K>,
    namespace: &str,
    obj: &K,
    validate: F,
) -> Result<K, StoreError>
where
    K: Resource + Clone,
    F: FnOnce(&K, &K) -> Result<(), StoreError>,
{
    let name = object_name(obj)?;
    let mut objects = lock(objects);
    let existing = objects.get(&key(namespace, &name))
        .ok_or_else(|| StoreError::NotFound(format!("{}/{}", namespace, name)))?;

    if obj.meta().resource_version != existing.meta().resource_version {
        return Err(StoreError::Conflict(format!(
            "{}/{}: resourceVersion {:?} is stale (current {:?})",
            namespace,
            name,
            obj.meta().resource_version,
            existing.meta().resource_version,
        )));
    }
    validate(existing, obj)?;

    let mut stored = obj.clone();
    let meta = stored.meta_mut();
    meta.namespace = Some(namespace.to_string());
    meta.uid = existing.meta().uid.clone();
    meta.generation = existing.meta().generation.map(|g| g + 1);
    meta.resource_version = Some(store.next_revision());

    objects.insert(key(namespace, &name), stored.clone());
    Ok(stored)
}

/// Removes an object; returns whether anything was removed.
pub(crate) fn delete<K>(objects: &Objects<K>, namespace: &str, name: &str) -> bool {
    lock(objects).remove(&key(namespace, name)).is_some()
}

/// Removes every object controlled or owned by `owner_uid`; returns the removed names.
pub(crate) fn collect_garbage<K: Resource>(objects: &Objects<K>, owner_uid: &str) -> Vec<String> {
    let mut objects = lock(objects);
    let owned: Vec<ObjectKey> = objects
        .iter()
        .filter(|(_, obj)| {
            obj.meta().owner_references.as_ref()
                .is_some_and(|refs| refs.iter().any(|r| r.uid == owner_uid))
        })
        .map(|(k, _)| k.clone())
        .collect();
    for k in &owned {
        objects.remove(k);
    }
    owned.into_iter().map(|(_, name)| name).collect()
}
