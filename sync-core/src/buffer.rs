//! Change reorder buffer for treesync.
//!
//! Collects the per-entry add/update/delete observations made while diffing
//! one syncer write transaction, folds repeated observations of the same entry
//! into a single pending operation, and exports them in an order a consumer can
//! apply to a dependent tree:
//! - deletes first, children before their parents
//! - then adds and updates in tree pre-order, parents before their children
//!
//! The buffer is transaction-scoped. It must be empty before each calculation
//! and is cleared after each drain.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use treesync_types::{ChangeRecord, MetaHandle};

use crate::ordinal::Ordinal;

/// Read access to the tree needed to order changes.
///
/// Tombstoned entries must still resolve, since deletes are ordered by the
/// parentage they had when they were removed.
pub trait TreeLookup {
    /// Parent of `handle`, or `None` for the root and unknown handles.
    fn parent(&self, handle: MetaHandle) -> Option<MetaHandle>;

    /// Sibling position of `handle`, if it has one.
    fn ordinal(&self, handle: MetaHandle) -> Option<&Ordinal>;
}

/// A pending operation for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Delete,
    UpdatePropertiesOnly,
    UpdatePositionAndProperties,
}

/// Transaction-scoped accumulator of change observations.
#[derive(Debug, Default)]
pub struct ChangeReorderBuffer {
    operations: BTreeMap<MetaHandle, Operation>,
}

impl ChangeReorderBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` came into existence.
    pub fn push_added(&mut self, id: MetaHandle) {
        self.operations.insert(id, Operation::Add);
    }

    /// Record that `id` was tombstoned.
    ///
    /// An entry added earlier in the same transaction never externally
    /// existed, so both observations cancel out.
    pub fn push_deleted(&mut self, id: MetaHandle) {
        if self.operations.get(&id) == Some(&Operation::Add) {
            self.operations.remove(&id);
        } else {
            self.operations.insert(id, Operation::Delete);
        }
    }

    /// Record that visible fields of `id` changed.
    pub fn push_updated(&mut self, id: MetaHandle, position_changed: bool) {
        let folded = match self.operations.get(&id) {
            Some(Operation::Add) => Operation::Add,
            Some(Operation::Delete) => Operation::Delete,
            Some(Operation::UpdatePositionAndProperties) => Operation::UpdatePositionAndProperties,
            Some(Operation::UpdatePropertiesOnly) | None if position_changed => {
                Operation::UpdatePositionAndProperties
            }
            Some(Operation::UpdatePropertiesOnly) | None => Operation::UpdatePropertiesOnly,
        };
        self.operations.insert(id, folded);
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of entries with a pending operation.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.operations.clear();
    }

    /// Clear leftovers from a drain that never happened.
    ///
    /// Returns true if stale operations were discarded. Delivering them late
    /// would attribute them to the wrong transaction.
    pub fn discard_stale(&mut self) -> bool {
        if self.operations.is_empty() {
            return false;
        }
        tracing::warn!(
            "Change buffer held {} unapplied changes from an earlier transaction; discarding",
            self.operations.len()
        );
        self.operations.clear();
        true
    }

    /// Export pending operations in tree order.
    ///
    /// Deletes come first, deepest entries first. Adds and updates follow in
    /// pre-order over `(ordinal, handle)` paths from the root, so every record
    /// follows its parent's.
    pub fn get_all_changes_in_tree_order<T>(&self, tree: &T) -> Vec<ChangeRecord>
    where
        T: TreeLookup + ?Sized,
    {
        let mut deletes: Vec<(usize, MetaHandle)> = Vec::new();
        let mut others: Vec<(Vec<(Option<Ordinal>, MetaHandle)>, ChangeRecord)> = Vec::new();

        for (&id, &op) in &self.operations {
            let path = path_from_root(tree, id);
            match op {
                Operation::Delete => deletes.push((path.len(), id)),
                Operation::Add => others.push((path, ChangeRecord::added(id))),
                Operation::UpdatePropertiesOnly => {
                    others.push((path, ChangeRecord::updated(id, false)))
                }
                Operation::UpdatePositionAndProperties => {
                    others.push((path, ChangeRecord::updated(id, true)))
                }
            }
        }

        deletes.sort_by_key(|&(depth, id)| (Reverse(depth), id));
        others.sort_by(|a, b| a.0.cmp(&b.0));

        deletes
            .into_iter()
            .map(|(_, id)| ChangeRecord::deleted(id))
            .chain(others.into_iter().map(|(_, record)| record))
            .collect()
    }
}

/// `(ordinal, handle)` pairs from the topmost ancestor down to `handle`.
fn path_from_root<T>(tree: &T, handle: MetaHandle) -> Vec<(Option<Ordinal>, MetaHandle)>
where
    T: TreeLookup + ?Sized,
{
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(handle);
    while let Some(h) = current {
        if !seen.insert(h) {
            tracing::warn!("Parent cycle through {} while ordering changes", h);
            break;
        }
        path.push((tree.ordinal(h).cloned(), h));
        current = tree.parent(h);
    }
    path.reverse();
    path
}
