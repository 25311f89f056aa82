//! Error types for treesync.

use thiserror::Error;

use crate::MetaHandle;

/// Errors shared across treesync layers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No directory is open for the share's user.
    #[error("no directory open for user {0:?}")]
    DirectoryNotOpen(String),

    /// The manager has not finished initialization.
    #[error("sync manager not initialized")]
    NotInitialized,

    /// No authenticated user is known yet.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Entry lookup failed.
    #[error("entry not found: {0}")]
    EntryNotFound(MetaHandle),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::EntryNotFound(MetaHandle::new(99));
        assert_eq!(err.to_string(), "entry not found: 99");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
