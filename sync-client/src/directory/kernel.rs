//! Entry storage and the lookup indexes kept alongside it.

use std::collections::{BTreeMap, HashMap, HashSet};
use treesync_core::{Ordinal, TreeLookup};
use treesync_types::{Id, MetaHandle};

use super::entry::EntryKernel;

type SiblingKey = (Ordinal, Id);

/// The contents of one directory.
///
/// Entries are never removed, so every handle ever allocated keeps resolving.
/// The children index only holds live, non-root entries, keyed by
/// `(ordinal, id)` so iteration order is sibling order.
#[derive(Debug)]
pub struct Kernel {
    entries: HashMap<MetaHandle, EntryKernel>,
    ids: HashMap<Id, MetaHandle>,
    tags: HashMap<String, MetaHandle>,
    children: HashMap<Id, BTreeMap<SiblingKey, MetaHandle>>,
    next_handle: i64,
    root: MetaHandle,
    initial_sync_ended: bool,
}

impl Kernel {
    pub(crate) fn new() -> Self {
        let root = MetaHandle::new(1);
        let mut kernel = Self {
            entries: HashMap::new(),
            ids: HashMap::new(),
            tags: HashMap::new(),
            children: HashMap::new(),
            next_handle: root.value() + 1,
            root,
            initial_sync_ended: false,
        };
        let entry = EntryKernel::root(root);
        kernel.ids.insert(entry.id.clone(), root);
        kernel.entries.insert(root, entry);
        kernel
    }

    /// Handle of the root entry.
    pub fn root_handle(&self) -> MetaHandle {
        self.root
    }

    /// Number of entries, tombstones and root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the root exists from the start.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the initial download from the server has finished.
    pub fn initial_sync_ended(&self) -> bool {
        self.initial_sync_ended
    }

    pub(crate) fn set_initial_sync_ended(&mut self, ended: bool) {
        self.initial_sync_ended = ended;
    }

    /// Look up an entry by handle, tombstones included.
    pub fn get_by_handle(&self, handle: MetaHandle) -> Option<&EntryKernel> {
        self.entries.get(&handle)
    }

    /// Look up an entry by stable id, tombstones included.
    pub fn get_by_id(&self, id: &Id) -> Option<&EntryKernel> {
        self.ids.get(id).and_then(|h| self.entries.get(h))
    }

    /// Look up an entry by unique tag, tombstones included.
    pub fn get_by_tag(&self, tag: &str) -> Option<&EntryKernel> {
        self.tags.get(tag).and_then(|h| self.entries.get(h))
    }

    /// Live children of `parent`, in sibling order.
    pub fn child_handles(&self, parent: &Id) -> Vec<MetaHandle> {
        self.children
            .get(parent)
            .map(|siblings| siblings.values().copied().collect())
            .unwrap_or_default()
    }

    /// First live child of `parent`.
    pub fn first_child(&self, parent: &Id) -> Option<MetaHandle> {
        self.children
            .get(parent)
            .and_then(|siblings| siblings.values().next().copied())
    }

    /// The live sibling immediately before `handle`.
    pub fn predecessor(&self, handle: MetaHandle) -> Option<MetaHandle> {
        let (siblings, key) = self.sibling_slot(handle)?;
        siblings.range(..key).next_back().map(|(_, h)| *h)
    }

    /// The live sibling immediately after `handle`.
    pub fn successor(&self, handle: MetaHandle) -> Option<MetaHandle> {
        let (siblings, key) = self.sibling_slot(handle)?;
        siblings
            .range(key..)
            .map(|(_, h)| *h)
            .find(|h| *h != handle)
    }

    fn sibling_slot(&self, handle: MetaHandle) -> Option<(&BTreeMap<SiblingKey, MetaHandle>, SiblingKey)> {
        let entry = self.entries.get(&handle)?;
        if entry.is_root() || entry.is_del {
            return None;
        }
        let siblings = self.children.get(&entry.parent_id)?;
        Some((siblings, (entry.ordinal.clone(), entry.id.clone())))
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    ///
    /// A broken or cyclic parent chain answers true, so callers refuse the
    /// move rather than make things worse.
    pub fn is_ancestor_or_self(&self, ancestor: &Id, id: &Id) -> bool {
        let mut seen = HashSet::new();
        let mut current = id.clone();
        loop {
            if &current == ancestor {
                return true;
            }
            if current.is_root() {
                return false;
            }
            if !seen.insert(current.clone()) {
                tracing::warn!("Parent cycle through {:?}", current);
                return true;
            }
            match self.get_by_id(&current) {
                Some(entry) => current = entry.parent_id.clone(),
                None => return false,
            }
        }
    }

    /// An ordinal placing an entry right after `predecessor` under `parent`,
    /// or first if there is no predecessor.
    ///
    /// `moving` is left out of the sibling list so an entry can be
    /// repositioned among its current siblings.
    pub fn ordinal_after(
        &self,
        parent: &Id,
        predecessor: Option<MetaHandle>,
        moving: Option<MetaHandle>,
    ) -> Ordinal {
        let lower = predecessor
            .and_then(|h| self.entries.get(&h))
            .map(|e| (e.ordinal.clone(), e.id.clone()));

        let mut tied = 0usize;
        let upper = self.children.get(parent).and_then(|siblings| {
            siblings
                .iter()
                .filter(|(key, h)| Some(**h) != moving && lower.as_ref().map_or(true, |lo| *key > lo))
                .map(|((ordinal, _), _)| ordinal)
                .find(|ordinal| match &lower {
                    Some((lo, _)) if *ordinal <= lo => {
                        tied += 1;
                        false
                    }
                    _ => true,
                })
        });

        if tied > 0 {
            if let Some((lo, _)) = &lower {
                tracing::warn!("{} siblings share ordinal {}; placing after all of them", tied, lo);
            }
        }
        Ordinal::create_between(lower.as_ref().map(|(o, _)| o), upper)
    }

    /// Insert a new entry. `None` if `id` is taken.
    pub(crate) fn insert_new(&mut self, id: Id, parent_id: Id, ordinal: Ordinal) -> Option<MetaHandle> {
        if self.ids.contains_key(&id) {
            tracing::warn!("Refusing to create duplicate entry {:?}", id);
            return None;
        }
        let handle = MetaHandle::new(self.next_handle);
        self.next_handle += 1;

        let entry = EntryKernel::new_child(handle, id, parent_id, ordinal);
        self.ids.insert(entry.id.clone(), handle);
        self.index(&entry);
        self.entries.insert(handle, entry);
        Some(handle)
    }

    /// Apply `f` to an entry, keeping the indexes in step. Identity fields are
    /// restored after `f` runs. Returns false if the handle is unknown.
    pub(crate) fn mutate<F>(&mut self, handle: MetaHandle, f: F) -> bool
    where
        F: FnOnce(&mut EntryKernel),
    {
        let Some(before) = self.entries.get(&handle).cloned() else {
            return false;
        };
        let mut after = before.clone();
        f(&mut after);
        after.meta_handle = before.meta_handle;
        after.id = before.id.clone();
        if after.is_root() {
            after.parent_id = before.parent_id.clone();
            after.is_del = false;
        }

        self.unindex(&before);
        self.index(&after);
        self.entries.insert(handle, after);
        true
    }

    fn index(&mut self, entry: &EntryKernel) {
        if !entry.is_root() && !entry.is_del {
            self.children
                .entry(entry.parent_id.clone())
                .or_default()
                .insert((entry.ordinal.clone(), entry.id.clone()), entry.meta_handle);
        }
        if let Some(tag) = &entry.unique_tag {
            self.tags.insert(tag.clone(), entry.meta_handle);
        }
    }

    fn unindex(&mut self, entry: &EntryKernel) {
        if let Some(siblings) = self.children.get_mut(&entry.parent_id) {
            siblings.remove(&(entry.ordinal.clone(), entry.id.clone()));
            if siblings.is_empty() {
                self.children.remove(&entry.parent_id);
            }
        }
        if let Some(tag) = &entry.unique_tag {
            if self.tags.get(tag) == Some(&entry.meta_handle) {
                self.tags.remove(tag);
            }
        }
    }
}

impl TreeLookup for Kernel {
    fn parent(&self, handle: MetaHandle) -> Option<MetaHandle> {
        let entry = self.entries.get(&handle)?;
        if entry.is_root() {
            return None;
        }
        self.ids.get(&entry.parent_id).copied()
    }

    fn ordinal(&self, handle: MetaHandle) -> Option<&Ordinal> {
        self.entries.get(&handle).map(|e| &e.ordinal)
    }
}
