//! Typed views over directory entries.
//!
//! [`ReadNode`] binds to an entry inside any transaction and exposes tree
//! navigation. [`WriteNode`] additionally mutates, inside a
//! [`WriteTransaction`]. Both are cheap values holding a handle; every getter
//! goes back to the transaction, so a node never observes stale fields.
//!
//! Setters compare against the stored value first and skip the write when
//! nothing changes, so a redundant call neither dirties the entry nor produces
//! a change record.

use thiserror::Error;
use treesync_core::naming::{from_server_name, to_server_name};
use treesync_types::{Id, MetaHandle};

use crate::directory::{BaseTransaction, EntryKernel, Kernel, WriteTransaction};

/// Why a structural write was refused. State is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The parent (or the node itself) is unknown or deleted.
    #[error("entry {0} not found or deleted")]
    NotFound(MetaHandle),

    /// The given predecessor is not a live child of the given parent.
    #[error("predecessor {predecessor} is not a child of {parent}")]
    PredecessorNotChild {
        /// The supplied predecessor.
        predecessor: MetaHandle,
        /// The supplied parent.
        parent: MetaHandle,
    },

    /// The new parent is the node itself or one of its descendants.
    #[error("moving {node} under {parent} would create a cycle")]
    WouldCreateCycle {
        /// The node being moved.
        node: MetaHandle,
        /// The rejected parent.
        parent: MetaHandle,
    },

    /// The directory refused the new entry.
    #[error("could not create entry under {0}")]
    CreationFailed(MetaHandle),
}

/// Read access common to both node kinds.
pub trait BaseNode {
    /// Handle of the bound entry.
    fn get_id(&self) -> MetaHandle;

    /// The transaction the node lives in.
    fn transaction(&self) -> &dyn BaseTransaction;

    /// Stable, server-comparable id.
    fn get_server_id(&self) -> Id {
        with_entry(self, |e| e.id.clone()).unwrap_or_default()
    }

    /// Handle of the parent. `None` for the root.
    fn get_parent_id(&self) -> Option<MetaHandle> {
        let kernel = self.transaction().kernel();
        let entry = kernel.get_by_handle(self.get_id())?;
        if entry.is_root() {
            return None;
        }
        kernel.get_by_id(&entry.parent_id).map(|p| p.meta_handle)
    }

    /// Whether the node is a folder.
    fn get_is_folder(&self) -> bool {
        with_entry(self, |e| e.is_dir).unwrap_or(false)
    }

    /// Caller-facing title.
    fn get_title(&self) -> String {
        with_entry(self, |e| from_server_name(&e.non_unique_name)).unwrap_or_default()
    }

    /// Bookmark URL.
    fn get_url(&self) -> String {
        with_entry(self, |e| e.url.clone()).unwrap_or_default()
    }

    /// Favicon bytes.
    fn get_favicon_bytes(&self) -> Vec<u8> {
        with_entry(self, |e| e.favicon.clone()).unwrap_or_default()
    }

    /// Caller-assigned correlation id.
    fn get_external_id(&self) -> i64 {
        with_entry(self, |e| e.external_id).unwrap_or(0)
    }

    /// Live children in sibling order.
    fn get_child_ids(&self) -> Vec<MetaHandle> {
        let kernel = self.transaction().kernel();
        match kernel.get_by_handle(self.get_id()) {
            Some(entry) => kernel.child_handles(&entry.id),
            None => Vec::new(),
        }
    }

    /// First live child.
    fn get_first_child_id(&self) -> Option<MetaHandle> {
        let kernel = self.transaction().kernel();
        let entry = kernel.get_by_handle(self.get_id())?;
        kernel.first_child(&entry.id)
    }

    /// Previous live sibling. `None` for the first child and the root.
    fn get_predecessor_id(&self) -> Option<MetaHandle> {
        self.transaction().kernel().predecessor(self.get_id())
    }

    /// Next live sibling. `None` for the last child and the root.
    fn get_successor_id(&self) -> Option<MetaHandle> {
        self.transaction().kernel().successor(self.get_id())
    }
}

fn with_entry<N, R>(node: &N, f: impl FnOnce(&EntryKernel) -> R) -> Option<R>
where
    N: BaseNode + ?Sized,
{
    let kernel = node.transaction().kernel();
    kernel.get_by_handle(node.get_id()).map(f)
}

/// Bind to `entry` unless it is missing or a tombstone.
fn bind(entry: Option<&EntryKernel>) -> Option<MetaHandle> {
    let entry = entry?;
    if entry.is_del {
        return None;
    }
    if !entry.is_api_object && !entry.is_root() {
        tracing::warn!("Bound node {} is not an API object", entry.meta_handle);
    }
    Some(entry.meta_handle)
}

/// A read-only node.
#[derive(Clone, Copy)]
pub struct ReadNode<'t> {
    trans: &'t dyn BaseTransaction,
    handle: MetaHandle,
}

impl<'t> ReadNode<'t> {
    /// Bind to a live entry by handle.
    pub fn init_by_id_lookup(trans: &'t dyn BaseTransaction, handle: MetaHandle) -> Option<Self> {
        let handle = bind(trans.kernel().get_by_handle(handle))?;
        Some(Self { trans, handle })
    }

    /// Bind to a live entry by unique tag. An empty tag never matches.
    pub fn init_by_tag_lookup(trans: &'t dyn BaseTransaction, tag: &str) -> Option<Self> {
        if tag.is_empty() {
            return None;
        }
        let handle = bind(trans.kernel().get_by_tag(tag))?;
        Some(Self { trans, handle })
    }

    /// Bind to a live entry by stable id.
    pub fn init_by_server_id_lookup(trans: &'t dyn BaseTransaction, id: &Id) -> Option<Self> {
        let handle = bind(trans.kernel().get_by_id(id))?;
        Some(Self { trans, handle })
    }

    /// Bind to the root. Always succeeds.
    pub fn init_by_root_lookup(trans: &'t dyn BaseTransaction) -> Self {
        let handle = trans.kernel().root_handle();
        Self { trans, handle }
    }
}

impl BaseNode for ReadNode<'_> {
    fn get_id(&self) -> MetaHandle {
        self.handle
    }

    fn transaction(&self) -> &dyn BaseTransaction {
        self.trans
    }
}

/// A mutable node.
pub struct WriteNode<'t, 'd> {
    trans: &'t WriteTransaction<'d>,
    handle: MetaHandle,
}

impl<'t, 'd> WriteNode<'t, 'd> {
    /// Bind to a live, non-root entry by handle.
    pub fn init_by_id_lookup(trans: &'t WriteTransaction<'d>, handle: MetaHandle) -> Option<Self> {
        let kernel = trans.kernel();
        let handle = bind_writable(&kernel, kernel.get_by_handle(handle))?;
        Some(Self { trans, handle })
    }

    /// Bind to a live, non-root entry by unique tag.
    pub fn init_by_tag_lookup(trans: &'t WriteTransaction<'d>, tag: &str) -> Option<Self> {
        if tag.is_empty() {
            return None;
        }
        let kernel = trans.kernel();
        let handle = bind_writable(&kernel, kernel.get_by_tag(tag))?;
        Some(Self { trans, handle })
    }

    /// Create a folder under `parent`, right after `predecessor` or as the
    /// first child. The new entry is dirty.
    pub fn init_by_creation(
        trans: &'t WriteTransaction<'d>,
        parent: &dyn BaseNode,
        predecessor: Option<&dyn BaseNode>,
    ) -> Result<Self, NodeError> {
        let parent_handle = parent.get_id();
        let predecessor = predecessor.map(|p| p.get_id());

        let (parent_id, ordinal) = {
            let kernel = trans.kernel();
            let parent_entry = live_entry(&kernel, parent_handle)?;
            check_predecessor(&kernel, parent_entry, predecessor, None)?;
            let ordinal = kernel.ordinal_after(&parent_entry.id, predecessor, None);
            (parent_entry.id.clone(), ordinal)
        };

        let handle = trans
            .create_entry(Id::new_client(), &parent_id, ordinal)
            .ok_or(NodeError::CreationFailed(parent_handle))?;
        trans.mutate(handle, |e| e.is_unsynced = true);
        Ok(Self { trans, handle })
    }

    /// Set the title, stored in transport form.
    pub fn set_title(&self, title: &str) {
        let server_name = to_server_name(title);
        self.put(
            |e| e.non_unique_name == server_name,
            |e| e.non_unique_name = server_name.clone(),
        );
    }

    /// Set the bookmark URL.
    pub fn set_url(&self, url: &str) {
        self.put(|e| e.url == url, |e| e.url = url.to_string());
    }

    /// Set whether the node is a folder.
    pub fn set_is_folder(&self, is_folder: bool) {
        self.put(|e| e.is_dir == is_folder, |e| e.is_dir = is_folder);
    }

    /// Set the favicon bytes.
    pub fn set_favicon_bytes(&self, bytes: &[u8]) {
        self.put(|e| e.favicon == bytes, |e| e.favicon = bytes.to_vec());
    }

    /// Set the correlation id. Local only, so the entry is not dirtied.
    pub fn set_external_id(&self, external_id: i64) {
        if with_entry(self, |e| e.external_id == external_id).unwrap_or(true) {
            return;
        }
        self.trans.mutate(self.handle, |e| e.external_id = external_id);
    }

    /// Set the unique tag. Server-side bookkeeping, so the entry is not
    /// dirtied.
    pub fn set_unique_tag(&self, tag: Option<&str>) {
        if with_entry(self, |e| e.unique_tag.as_deref() == tag).unwrap_or(true) {
            return;
        }
        let tag = tag.map(str::to_string);
        self.trans.mutate(self.handle, |e| e.unique_tag = tag);
    }

    /// Move under `new_parent`, right after `predecessor` or as the first
    /// child.
    ///
    /// A move to the current parent and predecessor does nothing. A move under
    /// the node itself or one of its descendants is refused.
    pub fn set_position(
        &self,
        new_parent: &dyn BaseNode,
        predecessor: Option<&dyn BaseNode>,
    ) -> Result<(), NodeError> {
        let parent_handle = new_parent.get_id();
        let predecessor = predecessor.map(|p| p.get_id());

        let (parent_id, ordinal) = {
            let kernel = self.trans.kernel();
            let entry = live_entry(&kernel, self.handle)?;
            let parent_entry = live_entry(&kernel, parent_handle)?;
            check_predecessor(&kernel, parent_entry, predecessor, Some(self.handle))?;

            if entry.parent_id == parent_entry.id && kernel.predecessor(self.handle) == predecessor {
                return Ok(());
            }
            if kernel.is_ancestor_or_self(&entry.id, &parent_entry.id) {
                return Err(NodeError::WouldCreateCycle {
                    node: self.handle,
                    parent: parent_handle,
                });
            }
            let ordinal = kernel.ordinal_after(&parent_entry.id, predecessor, Some(self.handle));
            (parent_entry.id.clone(), ordinal)
        };

        self.trans.mutate(self.handle, |e| {
            e.parent_id = parent_id;
            e.ordinal = ordinal;
            e.is_unsynced = true;
        });
        Ok(())
    }

    /// Tombstone the node. Children are left alone.
    pub fn remove(&self) {
        self.put(|e| e.is_del, |e| e.is_del = true);
    }

    /// Write `apply` and mark dirty, unless `unchanged` says the stored value
    /// already matches.
    fn put<U, A>(&self, unchanged: U, apply: A)
    where
        U: FnOnce(&EntryKernel) -> bool,
        A: FnOnce(&mut EntryKernel),
    {
        if with_entry(self, unchanged).unwrap_or(true) {
            return;
        }
        self.trans.mutate(self.handle, |e| {
            apply(e);
            e.is_unsynced = true;
        });
    }
}

impl BaseNode for WriteNode<'_, '_> {
    fn get_id(&self) -> MetaHandle {
        self.handle
    }

    fn transaction(&self) -> &dyn BaseTransaction {
        self.trans
    }
}

fn bind_writable(kernel: &Kernel, entry: Option<&EntryKernel>) -> Option<MetaHandle> {
    let handle = bind(entry)?;
    if handle == kernel.root_handle() {
        tracing::warn!("The root cannot be bound for writing");
        return None;
    }
    Some(handle)
}

fn live_entry(kernel: &Kernel, handle: MetaHandle) -> Result<&EntryKernel, NodeError> {
    kernel
        .get_by_handle(handle)
        .filter(|e| !e.is_del)
        .ok_or(NodeError::NotFound(handle))
}

/// `predecessor`, if given, must be a live child of `parent` other than the
/// node being placed.
fn check_predecessor(
    kernel: &Kernel,
    parent: &EntryKernel,
    predecessor: Option<MetaHandle>,
    placing: Option<MetaHandle>,
) -> Result<(), NodeError> {
    let Some(predecessor) = predecessor else {
        return Ok(());
    };
    let is_child = kernel
        .get_by_handle(predecessor)
        .is_some_and(|p| !p.is_del && !p.is_root() && p.parent_id == parent.id);
    if !is_child || Some(predecessor) == placing {
        tracing::warn!(
            "Predecessor {} is not a child of {}",
            predecessor,
            parent.meta_handle
        );
        return Err(NodeError::PredecessorNotChild {
            predecessor,
            parent: parent.meta_handle,
        });
    }
    Ok(())
}
