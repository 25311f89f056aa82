//! In-memory directory of tree entries.
//!
//! The directory is the storage collaborator the coordinator builds on:
//! transaction-scoped field access, lookups by handle, id, tag or root, entry
//! creation, and one change notification per write transaction, tagged with
//! the writer that produced it.
//!
//! # Example
//!
//! ```ignore
//! let directory = Directory::new("user@example.com");
//! {
//!     let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
//!     // ... mutate through node views ...
//! } // change notification fires here
//! ```

mod entry;
mod kernel;
mod manager;
mod transaction;

pub use entry::EntryKernel;
pub use kernel::Kernel;
pub use manager::DirectoryManager;
pub use transaction::{BaseTransaction, KernelView, ReadTransaction, WriteTransaction};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use treesync_types::{ChangeRecord, MetaHandle, WriterTag};

/// What a finished write transaction did, as seen while its lock is held.
pub struct ChangeEvent<'a> {
    /// Who wrote.
    pub writer: WriterTag,
    /// Pre-images of every touched entry. Entries created by the transaction
    /// appear as tombstones.
    pub originals: &'a BTreeMap<MetaHandle, EntryKernel>,
    /// Post-transaction contents.
    pub kernel: &'a Kernel,
}

/// Receives the two notifications fired by every write transaction.
pub trait DirectoryChangeListener: Send + Sync {
    /// Runs while the write lock is still held. Must not open transactions on
    /// the same directory.
    ///
    /// The returned records travel with the transaction and come back in its
    /// own `transaction_complete` call.
    fn calculate_changes(&self, event: &ChangeEvent<'_>) -> Vec<ChangeRecord>;

    /// Runs after the write lock has been released, with whatever
    /// `calculate_changes` returned for the same transaction.
    fn transaction_complete(
        &self,
        directory: &Directory,
        writer: WriterTag,
        changes: Vec<ChangeRecord>,
    );
}

/// One user's tree of entries.
pub struct Directory {
    name: String,
    kernel: RwLock<Kernel>,
    listener: Mutex<Option<Weak<dyn DirectoryChangeListener>>>,
}

impl Directory {
    /// Create an empty directory holding only the root.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kernel: RwLock::new(Kernel::new()),
            listener: Mutex::new(None),
        }
    }

    /// The share name this directory was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route change notifications to `listener`. Only a weak reference is
    /// kept; notifications stop once the listener is dropped.
    pub fn set_change_listener(&self, listener: Weak<dyn DirectoryChangeListener>) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    /// Stop routing change notifications.
    pub fn clear_change_listener(&self) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a listener is hooked up and still alive.
    pub fn has_change_listener(&self) -> bool {
        self.listener().is_some()
    }

    /// Whether the initial download from the server has finished.
    pub fn initial_sync_ended(&self) -> bool {
        self.read_kernel().initial_sync_ended()
    }

    /// Record that the initial download has finished.
    ///
    /// Takes the write lock; must not be called while this thread has a
    /// transaction open on the directory.
    pub fn mark_initial_sync_ended(&self) {
        self.write_kernel().set_initial_sync_ended(true);
    }

    pub(crate) fn read_kernel(&self) -> RwLockReadGuard<'_, Kernel> {
        self.kernel.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_kernel(&self) -> RwLockWriteGuard<'_, Kernel> {
        self.kernel.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn listener(&self) -> Option<Arc<dyn DirectoryChangeListener>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub(crate) fn notify_calculate_changes(&self, event: &ChangeEvent<'_>) -> Vec<ChangeRecord> {
        match self.listener() {
            Some(listener) => listener.calculate_changes(event),
            None => Vec::new(),
        }
    }

    pub(crate) fn notify_transaction_complete(&self, writer: WriterTag, changes: Vec<ChangeRecord>) {
        if let Some(listener) = self.listener() {
            listener.transaction_complete(self, writer, changes);
        }
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
