//! Scoped read and write access to a [`Directory`].
//!
//! A [`WriteTransaction`] holds the directory's write lock for its whole
//! lifetime and remembers the pre-image of every entry it touches. Dropping it
//! runs the two-phase change notification:
//!
//! 1. `calculate_changes` fires with the lock still held, so the listener sees
//!    pre-images and post-images of the same write. Whatever it returns is
//!    kept by the transaction.
//! 2. The lock is released.
//! 3. `transaction_complete` fires with those records, and the listener may
//!    open a [`ReadTransaction`] of its own.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};
use treesync_core::Ordinal;
use treesync_types::{ChangeRecord, Id, MetaHandle, WriterTag};

use super::entry::EntryKernel;
use super::kernel::Kernel;
use super::{ChangeEvent, Directory};

/// Read access shared by both transaction kinds.
pub trait BaseTransaction {
    /// Borrow the directory contents.
    ///
    /// Inside a write transaction the view must be dropped before the next
    /// write.
    fn kernel(&self) -> KernelView<'_>;

    /// The directory this transaction is open on.
    fn directory(&self) -> &Directory;
}

/// A borrowed view of a directory's contents.
pub enum KernelView<'a> {
    /// Borrowed straight from a read guard.
    Shared(&'a Kernel),
    /// Borrowed from a write transaction's state.
    Writing(Ref<'a, Kernel>),
}

impl Deref for KernelView<'_> {
    type Target = Kernel;

    fn deref(&self) -> &Kernel {
        match self {
            KernelView::Shared(kernel) => kernel,
            KernelView::Writing(kernel) => &**kernel,
        }
    }
}

/// Shared, read-only access. Any number may be open at once, but never
/// alongside a write transaction.
pub struct ReadTransaction<'d> {
    directory: &'d Directory,
    guard: RwLockReadGuard<'d, Kernel>,
}

impl<'d> ReadTransaction<'d> {
    /// Open a read transaction, blocking while a writer is active.
    pub fn new(directory: &'d Directory) -> Self {
        Self {
            directory,
            guard: directory.read_kernel(),
        }
    }
}

impl BaseTransaction for ReadTransaction<'_> {
    fn kernel(&self) -> KernelView<'_> {
        KernelView::Shared(&self.guard)
    }

    fn directory(&self) -> &Directory {
        self.directory
    }
}

struct WriteState<'d> {
    guard: RwLockWriteGuard<'d, Kernel>,
    originals: BTreeMap<MetaHandle, EntryKernel>,
    writer: WriterTag,
}

/// Fires `transaction_complete` once the write guard is gone.
struct Completion<'d> {
    directory: &'d Directory,
    writer: WriterTag,
    changes: Vec<ChangeRecord>,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let changes = std::mem::take(&mut self.changes);
        self.directory.notify_transaction_complete(self.writer, changes);
    }
}

/// Exclusive access. Only one may be open per directory at a time.
pub struct WriteTransaction<'d> {
    // Field order matters: `state` (and the write guard in it) must drop
    // before `completion` fires.
    state: RefCell<WriteState<'d>>,
    completion: Completion<'d>,
}

impl<'d> WriteTransaction<'d> {
    /// Open a write transaction on behalf of `writer`, blocking until every
    /// other transaction on the directory has closed.
    pub fn new(directory: &'d Directory, writer: WriterTag) -> Self {
        Self {
            state: RefCell::new(WriteState {
                guard: directory.write_kernel(),
                originals: BTreeMap::new(),
                writer,
            }),
            completion: Completion {
                directory,
                writer,
                changes: Vec::new(),
            },
        }
    }

    /// Who opened this transaction.
    pub fn writer(&self) -> WriterTag {
        self.completion.writer
    }

    /// Create an entry under `parent_id` at `ordinal`.
    ///
    /// The recorded pre-image is a tombstone, so change detection sees the
    /// entry come into existence. Returns `None` if `id` is already taken.
    pub fn create_entry(&self, id: Id, parent_id: &Id, ordinal: Ordinal) -> Option<MetaHandle> {
        let mut state = self.state.borrow_mut();
        let WriteState {
            guard, originals, ..
        } = &mut *state;

        let handle = guard.insert_new(id, parent_id.clone(), ordinal)?;
        if let Some(created) = guard.get_by_handle(handle) {
            let mut original = created.clone();
            original.is_del = true;
            originals.insert(handle, original);
        }
        Some(handle)
    }

    /// Change an entry in place, saving its pre-image on first touch.
    ///
    /// Returns false if the handle is unknown.
    pub fn mutate<F>(&self, handle: MetaHandle, f: F) -> bool
    where
        F: FnOnce(&mut EntryKernel),
    {
        let mut state = self.state.borrow_mut();
        let WriteState {
            guard, originals, ..
        } = &mut *state;

        let Some(current) = guard.get_by_handle(handle) else {
            return false;
        };
        originals
            .entry(handle)
            .or_insert_with(|| current.clone());
        guard.mutate(handle, f)
    }

    /// Handles touched so far, in handle order.
    pub fn touched(&self) -> Vec<MetaHandle> {
        self.state.borrow().originals.keys().copied().collect()
    }
}

impl BaseTransaction for WriteTransaction<'_> {
    fn kernel(&self) -> KernelView<'_> {
        KernelView::Writing(Ref::map(self.state.borrow(), |state| &*state.guard))
    }

    fn directory(&self) -> &Directory {
        self.completion.directory
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let event = ChangeEvent {
            writer: state.writer,
            originals: &state.originals,
            kernel: &state.guard,
        };
        self.completion.changes = self.completion.directory.notify_calculate_changes(&event);
    }
}
