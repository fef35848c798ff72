//! Helper functions for common reconciliation patterns
//!
//! The synchronizers share one shape: fetch the current object, merge the
//! desired fields into it, and persist only if the merge changed anything.
//! The planning half of that lives here and is pure, so it is tested
//! without a store.

use crate::error::ControllerError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::fmt;

/// Kind of child object managed for a gateway class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Deployment,
    Service,
}

impl ChildKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::Service => "Service",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a synchronizer did to a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildOutcome {
    Created,
    Updated,
    Unchanged,
}

impl ChildOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for ChildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write required to bring a child to its desired state
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyPlan<K> {
    /// Child is missing; create this object
    Create(K),
    /// Child exists and differs; replace it with this merged object
    Update(K),
    Unchanged,
}

/// Decides how to converge `current` onto `desired`.
///
/// `merge` folds the desired fields into a copy of the current object. If the
/// result equals `current`, nothing needs writing. The merged object keeps
/// the current `resourceVersion`, so a concurrent writer makes the
/// subsequent replace fail with a conflict instead of being overwritten.
pub fn plan_apply<K, F>(current: Option<&K>, desired: &K, merge: F) -> Result<ApplyPlan<K>, ControllerError>
where
    K: Clone + PartialEq,
    F: FnOnce(&K, &K) -> Result<K, ControllerError>,
{
    let Some(current) = current else {
        return Ok(ApplyPlan::Create(desired.clone()));
    };
    let merged = merge(current, desired)?;
    if merged == *current {
        Ok(ApplyPlan::Unchanged)
    } else {
        Ok(ApplyPlan::Update(merged))
    }
}

/// Folds desired metadata into current metadata.
///
/// Labels are merged key by key so labels added by other tools survive.
/// The controller owner reference is set with `set_controller_reference`.
pub fn merge_metadata(current: &mut ObjectMeta, desired: &ObjectMeta, kind: ChildKind) -> Result<(), ControllerError> {
    if let Some(desired_labels) = &desired.labels {
        let labels = current.labels.get_or_insert_with(Default::default);
        for (key, value) in desired_labels {
            labels.insert(key.clone(), value.clone());
        }
    }

    let owners = desired.owner_references.iter().flatten();
    for owner in owners.filter(|o| o.controller == Some(true)) {
        set_controller_reference(current, owner, kind)?;
    }
    Ok(())
}

/// Makes `owner` the controller of the object described by `meta`.
///
/// An existing reference to the same owner (by uid) is refreshed in place.
/// If a different object already controls this one the call fails rather
/// than stealing it.
pub fn set_controller_reference(meta: &mut ObjectMeta, owner: &OwnerReference, kind: ChildKind) -> Result<(), ControllerError> {
    let refs = meta.owner_references.get_or_insert_with(Vec::new);

    if let Some(other) = refs.iter().find(|r| r.controller == Some(true) && r.uid != owner.uid) {
        return Err(ControllerError::AlreadyOwned {
            kind: kind.as_str(),
            name: meta.name.clone().unwrap_or_default(),
            owner: format!("{} {} ({})", other.kind, other.name, other.uid),
        });
    }

    match refs.iter_mut().find(|r| r.uid == owner.uid) {
        Some(existing) => *existing = owner.clone(),
        None => refs.push(owner.clone()),
    }
    Ok(())
}

/// Uid in the object's controller owner reference, if it has one.
pub fn controller_uid(meta: &ObjectMeta) -> Option<&str> {
    meta.owner_references.iter()
        .flatten()
        .find(|r| r.controller == Some(true))
        .map(|r| r.uid.as_str())
}

/// True if the object's controller owner reference points at `owner_uid`.
pub fn is_controlled_by(meta: &ObjectMeta, owner_uid: &str) -> bool {
    controller_uid(meta) == Some(owner_uid)
}
