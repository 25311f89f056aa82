//! # sync-client
//!
//! Client library for the treesync engine.
//!
//! This is the library embedders use to keep a local tree in sync with a
//! server.
//!
//! ## Features
//!
//! - **Directory**: in-memory tree of entries with read/write transactions
//!   and per-transaction change notification
//! - **Node views**: typed, validated access to entries (`ReadNode`,
//!   `WriteNode`)
//! - **Coordinator**: `SyncManager` drives authentication, initialization,
//!   change delivery and peer notification through a pure state machine from
//!   sync-core
//! - **Pluggable collaborators**: auth, syncer, notifier and connectivity are
//!   traits, with mocks for tests
//!
//! ## Example
//!
//! ```ignore
//! use treesync_client::{SyncConfig, SyncManager, WriteNode, WriteTransaction};
//!
//! let manager = SyncManager::new(SyncConfig::default(), collaborators);
//! manager.init(None)?;
//! manager.authenticate(Credentials::new("user@example.com", "password"))?;
//!
//! // Once initialized:
//! let share = manager.user_share()?;
//! let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
//! let root = ReadNode::init_by_root_lookup(&trans);
//! let node = WriteNode::init_by_creation(&trans, &root, None)?;
//! node.set_title("Bookmarks bar");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod directory;
pub mod error;
pub mod manager;
pub mod mock;
pub mod node;
pub mod notifier;
pub mod status;
pub mod syncer;

pub use auth::{
    AuthWatcher, AuthWatcherEvent, CredentialStore, Credentials, GaiaFailure, StoredCredentials,
};
pub use config::{ConfigError, SyncConfig};
pub use connectivity::{
    spawn_address_watch, ChannelWatcher, ConnectionManager, ConnectionStatus,
    ConnectivityWatcher, PollingWatcher,
};
pub use directory::{
    BaseTransaction, ChangeEvent, Directory, DirectoryChangeListener, DirectoryManager,
    EntryKernel, ReadTransaction, WriteTransaction,
};
pub use error::ClientError;
pub use manager::{Collaborators, Observer, SyncManager};
pub use mock::{
    MockAuthWatcher, MockCollaborators, MockConnectionManager, MockCredentialStore,
    MockNotifier, MockSyncer, RecordingObserver,
};
pub use node::{BaseNode, NodeError, ReadNode, WriteNode};
pub use notifier::{NotificationStatus, PeerNotifier};
pub use status::{Status, StatusSummary};
pub use syncer::{NudgeSource, Syncer, SyncerEvent, SyncerStatus};
