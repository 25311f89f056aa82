//! Open directories, keyed by share name.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Directory;

/// Registry of open directories, one per authenticated user.
#[derive(Debug)]
pub struct DirectoryManager {
    database_location: PathBuf,
    open: DashMap<String, Arc<Directory>>,
}

impl DirectoryManager {
    /// Create a manager rooted at `database_location`.
    pub fn new(database_location: impl Into<PathBuf>) -> Self {
        Self {
            database_location: database_location.into(),
            open: DashMap::new(),
        }
    }

    /// Where directory storage lives.
    pub fn database_location(&self) -> &Path {
        &self.database_location
    }

    /// Open the directory for `name`, or return it if already open.
    pub fn open(&self, name: &str) -> Arc<Directory> {
        let directory = self
            .open
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("Opening directory {:?}", name);
                Arc::new(Directory::new(name))
            });
        Arc::clone(directory.value())
    }

    /// The open directory for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Directory>> {
        self.open.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a directory is open under `name`.
    pub fn is_open(&self, name: &str) -> bool {
        self.open.contains_key(name)
    }

    /// Close the directory for `name`. Outstanding handles stay usable until
    /// dropped. Returns false if it was not open.
    pub fn close(&self, name: &str) -> bool {
        let closed = self.open.remove(name).is_some();
        if closed {
            tracing::debug!("Closed directory {:?}", name);
        }
        closed
    }

    /// Close every open directory.
    pub fn close_all(&self) {
        self.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_is_idempotent() {
        let manager = DirectoryManager::new("/tmp/treesync");
        let a = manager.open("user@example.com");
        let b = manager.open("user@example.com");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "user@example.com");
    }

    #[test]
    fn close_forgets_the_directory() {
        let manager = DirectoryManager::new("/tmp/treesync");
        let first = manager.open("user");
        assert!(manager.is_open("user"));
        assert!(manager.close("user"));
        assert!(!manager.close("user"));
        assert!(manager.get("user").is_none());

        let second = manager.open("user");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn database_location_is_kept() {
        let manager = DirectoryManager::new("/var/lib/treesync");
        assert_eq!(manager.database_location(), Path::new("/var/lib/treesync"));
    }
}
