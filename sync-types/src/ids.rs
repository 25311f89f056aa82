//! Identity types for entries in a sync directory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-local integer surrogate for an entry.
///
/// Allocated monotonically by the directory and never reused, so a handle that
/// once referred to an entry keeps resolving to it (possibly a tombstone) for
/// the lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetaHandle(i64);

impl MetaHandle {
    /// Wrap a raw handle value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw handle value.
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for MetaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaHandle({})", self.0)
    }
}

impl fmt::Display for MetaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable, server-comparable identifier of an entry.
///
/// The root is `"r"`. Entries created locally get a `c`-prefixed UUID until the
/// server assigns them a permanent id; server ids carry an `s` prefix.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(String);

const ROOT_ID: &str = "r";

impl Id {
    /// The id of the root entry.
    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    /// Create a fresh client-side id for a locally created entry.
    pub fn new_client() -> Self {
        Self(format!("c{}", uuid::Uuid::new_v4().simple()))
    }

    /// Wrap a server-assigned id.
    pub fn from_server(value: &str) -> Self {
        Self(format!("s{}", value))
    }

    /// Whether this is the root id.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    /// Whether this id was assigned by the server.
    pub fn is_server_id(&self) -> bool {
        self.0.starts_with('s')
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the writer that produced a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriterTag {
    /// The local API caller (model changes made by the embedding application).
    SyncApi,
    /// The background syncer applying remote updates.
    Syncer,
    /// Test fixtures and tooling.
    Unittest,
}
