//! The stored form of a tree entry.

use treesync_core::naming::DEFAULT_NAME_FOR_NEW_NODES;
use treesync_core::Ordinal;
use treesync_types::{Id, MetaHandle};

/// One entry record, exactly as the directory stores it.
///
/// Names are kept in transport form; node views translate on the way in and
/// out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKernel {
    /// Process-local handle. Fixed at creation.
    pub meta_handle: MetaHandle,
    /// Stable id. Fixed at creation.
    pub id: Id,
    /// Id of the containing entry. The root is its own parent.
    pub parent_id: Id,
    /// Sibling position under `parent_id`.
    pub ordinal: Ordinal,
    /// Whether the entry is a folder.
    pub is_dir: bool,
    /// Tombstone flag.
    pub is_del: bool,
    /// Dirty flag: changed locally and not yet committed.
    pub is_unsynced: bool,
    /// Whether the entry surfaces through node views and change records.
    pub is_api_object: bool,
    /// Transport-form name.
    pub non_unique_name: String,
    /// Bookmark URL, empty for folders.
    pub url: String,
    /// Opaque favicon bytes.
    pub favicon: Vec<u8>,
    /// Caller-assigned correlation id. Never synced.
    pub external_id: i64,
    /// Symbolic well-known tag, e.g. the bookmark bar.
    pub unique_tag: Option<String>,
}

impl EntryKernel {
    pub(crate) fn root(meta_handle: MetaHandle) -> Self {
        Self {
            meta_handle,
            id: Id::root(),
            parent_id: Id::root(),
            ordinal: Ordinal::initial(),
            is_dir: true,
            is_del: false,
            is_unsynced: false,
            is_api_object: false,
            non_unique_name: String::new(),
            url: String::new(),
            favicon: Vec::new(),
            external_id: 0,
            unique_tag: None,
        }
    }

    /// A freshly created entry: placeholder name, a folder, visible.
    pub(crate) fn new_child(meta_handle: MetaHandle, id: Id, parent_id: Id, ordinal: Ordinal) -> Self {
        Self {
            meta_handle,
            id,
            parent_id,
            ordinal,
            is_dir: true,
            is_del: false,
            is_unsynced: false,
            is_api_object: true,
            non_unique_name: DEFAULT_NAME_FOR_NEW_NODES.to_string(),
            url: String::new(),
            favicon: Vec::new(),
            external_id: 0,
            unique_tag: None,
        }
    }

    /// Whether this is the directory root.
    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    /// Whether parentage or sibling order differ.
    pub fn position_differs(&self, other: &EntryKernel) -> bool {
        self.parent_id != other.parent_id || self.ordinal != other.ordinal
    }

    /// Whether any field an observer can see differs, position included.
    pub fn visible_properties_differ(&self, other: &EntryKernel) -> bool {
        self.non_unique_name != other.non_unique_name
            || self.is_dir != other.is_dir
            || self.url != other.url
            || self.favicon != other.favicon
            || self.position_differs(other)
    }
}
