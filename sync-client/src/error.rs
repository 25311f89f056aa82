//! Client errors.

use thiserror::Error;
use treesync_types::SyncError;

use crate::config::ConfigError;
use crate::node::NodeError;

/// Errors returned by the sync client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A node operation was refused.
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    /// Shared-layer error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// `init` was called twice.
    #[error("sync manager already initialized")]
    AlreadyInitialized,

    /// The manager was shut down.
    #[error("sync manager has been shut down")]
    ShutDown,

    /// Credentials for a different user were submitted after a user was
    /// already bound to this share.
    #[error("share belongs to {current:?}, refusing credentials for {requested:?}")]
    UsernameChanged {
        /// The user the share is bound to.
        current: String,
        /// The user named by the new credentials.
        requested: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesync_types::MetaHandle;

    #[test]
    fn wraps_layer_errors() {
        let err: ClientError = NodeError::NotFound(MetaHandle::new(3)).into();
        assert_eq!(err.to_string(), "node error: entry 3 not found or deleted");

        let err: ClientError = SyncError::NotInitialized.into();
        assert_eq!(err.to_string(), "sync manager not initialized");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
    }
}
