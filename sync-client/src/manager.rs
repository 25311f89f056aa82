//! SyncManager - the coordinator between the embedder and the sync engine.
//!
//! [`SyncManager`] owns the session state machine (from sync-core) and
//! interprets its actions against the collaborators: the auth watcher, the
//! syncer, the peer notifier and the directory.
//!
//! ```text
//! Embedder ──► SyncManager ──► AuthWatcher / Syncer / PeerNotifier
//!    ▲              │ ▲
//!    │              ▼ │ change events
//! Observer ◄─── SessionState   Directory
//! ```
//!
//! Events from any thread are folded into the state machine under one mutex.
//! The resulting actions run after that mutex is released, so observer
//! callbacks may call back into the manager.
//!
//! # Example
//!
//! ```ignore
//! let manager = SyncManager::new(SyncConfig::default(), collaborators);
//! manager.set_observer(observer);
//! manager.init(None)?;
//! manager.authenticate(Credentials::new("user@example.com", "password"))?;
//!
//! // Later, from the auth watcher's thread:
//! manager.handle_auth_event(AuthWatcherEvent::Succeeded { user_email });
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use treesync_core::{Action, ChangeReorderBuffer, Event, SessionState};
use treesync_types::{AuthError, AuthErrorState, ChangeRecord, SyncError, WriterTag};

use crate::auth::{AuthWatcher, AuthWatcherEvent, CredentialStore, Credentials, StoredCredentials};
use crate::config::SyncConfig;
use crate::connectivity::{spawn_address_watch, ConnectionManager, ConnectivityWatcher};
use crate::directory::{
    ChangeEvent, Directory, DirectoryChangeListener, DirectoryManager, ReadTransaction,
};
use crate::error::ClientError;
use crate::notifier::PeerNotifier;
use crate::status::{aggregate, Status, StatusSummary};
use crate::syncer::{NudgeSource, Syncer, SyncerEvent};

/// Receives notifications from the [`SyncManager`].
///
/// Callbacks arrive on whichever thread produced the underlying event.
pub trait Observer: Send + Sync {
    /// The syncer applied server changes. `changes` is in tree order: deletes
    /// deepest first, then adds and updates with parents before children.
    ///
    /// `trans` holds the directory's read lock; do not open a write
    /// transaction from inside this callback.
    fn on_changes_applied(&self, trans: &ReadTransaction<'_>, changes: &[ChangeRecord]);

    /// The share is authenticated and holds usable data. Fires once.
    fn on_initialization_complete(&self);

    /// Authentication state changed. A "no error" value means a previous
    /// problem is resolved.
    fn on_auth_error(&self, error: &AuthError);

    /// A sync cycle ended with nothing more known to sync.
    fn on_sync_cycle_completed(&self);
}

/// The external services a [`SyncManager`] drives.
pub struct Collaborators {
    /// Performs authentication.
    pub auth_watcher: Arc<dyn AuthWatcher>,
    /// Talks to the sync server in the background.
    pub syncer: Arc<dyn Syncer>,
    /// Tells peers about commits.
    pub notifier: Arc<dyn PeerNotifier>,
    /// Probes the sync server.
    pub connection: Arc<dyn ConnectionManager>,
    /// Remembers the last user to sign in.
    pub credential_store: Arc<dyn CredentialStore>,
}

/// The sync session coordinator. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<SyncInternal>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Lifecycle {
    initialized: bool,
    shut_down: bool,
}

/// What a `Start*Authentication` action should hand to the auth watcher.
enum AuthMaterial<'a> {
    None,
    Password(&'a Credentials),
    Token(&'a StoredCredentials),
    Lsid(&'a str),
}

struct SyncInternal {
    me: Weak<SyncInternal>,
    config: SyncConfig,
    auth_watcher: Arc<dyn AuthWatcher>,
    syncer: Arc<dyn Syncer>,
    notifier: Arc<dyn PeerNotifier>,
    connection: Arc<dyn ConnectionManager>,
    credential_store: Arc<dyn CredentialStore>,
    dir_manager: DirectoryManager,
    session: Mutex<SessionState>,
    change_buffer: Mutex<ChangeReorderBuffer>,
    observer: RwLock<Option<Arc<dyn Observer>>>,
    username: Mutex<Option<String>>,
    lifecycle: Mutex<Lifecycle>,
    address_watch: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncManager {
    /// Create a manager. Nothing happens until [`init`](Self::init).
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Self {
        let dir_manager = DirectoryManager::new(config.directory.database_location.clone());
        let inner = Arc::new_cyclic(|me| SyncInternal {
            me: me.clone(),
            config,
            auth_watcher: collaborators.auth_watcher,
            syncer: collaborators.syncer,
            notifier: collaborators.notifier,
            connection: collaborators.connection,
            credential_store: collaborators.credential_store,
            dir_manager,
            session: Mutex::new(SessionState::new()),
            change_buffer: Mutex::new(ChangeReorderBuffer::new()),
            observer: RwLock::new(None),
            username: Mutex::new(None),
            lifecycle: Mutex::new(Lifecycle::default()),
            address_watch: Mutex::new(None),
        });
        Self { inner }
    }

    /// Start the session.
    ///
    /// With `attempt_last_user_authentication` set and a stored user found,
    /// opens that user's directory and validates the stored token. Otherwise
    /// authenticates with `lsid` if one is given. With neither, reports
    /// [`AuthErrorState::CredentialsNeeded`] to the observer.
    ///
    /// # Errors
    ///
    /// Fails if called twice or after shutdown.
    pub fn init(&self, lsid: Option<&str>) -> Result<(), ClientError> {
        self.inner.init(lsid)
    }

    /// Submit a username and password. Ignored once authenticated.
    ///
    /// # Errors
    ///
    /// Fails before init, after shutdown, or if the share is already bound to
    /// a different user.
    pub fn authenticate(&self, credentials: Credentials) -> Result<(), ClientError> {
        self.inner.authenticate(credentials)
    }

    /// Submit an LSID cookie.
    ///
    /// # Errors
    ///
    /// Fails before init, after shutdown, or for an empty LSID.
    pub fn authenticate_with_lsid(&self, lsid: &str) -> Result<(), ClientError> {
        self.inner.ensure_running()?;
        if lsid.is_empty() {
            return Err(SyncError::InvalidData("empty LSID".to_string()).into());
        }
        self.inner
            .run(Event::LsidSubmitted, &AuthMaterial::Lsid(lsid));
        Ok(())
    }

    /// Feed an outcome reported by the auth watcher.
    pub fn handle_auth_event(&self, event: AuthWatcherEvent) {
        self.inner.handle_auth_event(event);
    }

    /// Feed a progress report from the syncer.
    pub fn handle_syncer_event(&self, event: SyncerEvent) {
        if self.inner.is_shut_down() {
            debug!("Ignoring syncer event after shutdown");
            return;
        }
        self.inner
            .run(Event::SyncerSnapshot(event.snapshot()), &AuthMaterial::None);
    }

    /// Route notifications to `observer`, replacing any previous one.
    pub fn set_observer(&self, observer: Arc<dyn Observer>) {
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Stop routing notifications.
    pub fn remove_observer(&self) {
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether the session is authenticated and the initial sync has ended.
    pub fn initialized(&self) -> bool {
        lock(&self.inner.session).is_ready()
    }

    /// The last authentication problem, `None` when healthy.
    pub fn auth_problem(&self) -> AuthErrorState {
        lock(&self.inner.session).auth_problem()
    }

    /// The user the share is bound to, once known.
    pub fn authenticated_username(&self) -> Option<String> {
        self.inner.username()
    }

    /// The user's directory.
    ///
    /// # Errors
    ///
    /// Fails until initialization completes.
    pub fn user_share(&self) -> Result<Arc<Directory>, ClientError> {
        if !self.initialized() {
            return Err(SyncError::NotInitialized.into());
        }
        let name = self.inner.username().ok_or(SyncError::NotAuthenticated)?;
        self.inner
            .dir_manager
            .get(&name)
            .ok_or_else(|| SyncError::DirectoryNotOpen(name).into())
    }

    /// A detailed status snapshot.
    pub fn status(&self) -> Status {
        let authenticated = lock(&self.inner.session).is_authenticated();
        aggregate(
            &self.inner.syncer.status(),
            &self.inner.connection.status(),
            &self.inner.notifier.status(),
            authenticated,
        )
    }

    /// The one-word status summary.
    pub fn status_summary(&self) -> StatusSummary {
        self.status().summary
    }

    /// Skip authentication: bind the share to `username`, open its directory
    /// and report initialization complete.
    ///
    /// # Errors
    ///
    /// Fails before init or after shutdown.
    pub fn setup_for_test_mode(&self, username: &str) -> Result<(), ClientError> {
        self.inner.ensure_running()?;
        *lock(&self.inner.username) = Some(username.to_string());
        self.inner.dir_manager.open(username);
        self.inner.run(Event::TestModeEntered, &AuthMaterial::None);
        Ok(())
    }

    /// Forward connectivity changes from `watcher` to the connection manager
    /// until shutdown. Must be called from within a tokio runtime.
    pub fn start_address_watch<W>(&self, watcher: W)
    where
        W: ConnectivityWatcher + 'static,
    {
        let task = spawn_address_watch(watcher, Arc::clone(&self.inner.connection));
        if let Some(previous) = lock(&self.inner.address_watch).replace(task) {
            previous.abort();
        }
    }

    /// Stop the session. Idempotent.
    ///
    /// The auth watcher stops first so that a late success cannot reopen the
    /// directory. Then the syncer is stopped (bounded by
    /// `thread_exit_timeout_ms`), the notifier logs out, the directory closes
    /// and change routing is unhooked.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncManager")
            .field("username", &self.inner.username())
            .field("session", &*lock(&self.inner.session))
            .finish_non_exhaustive()
    }
}

impl SyncInternal {
    fn init(&self, lsid: Option<&str>) -> Result<(), ClientError> {
        {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.shut_down {
                return Err(ClientError::ShutDown);
            }
            if lifecycle.initialized {
                return Err(ClientError::AlreadyInitialized);
            }
            lifecycle.initialized = true;
        }
        info!(
            "Initializing sync manager at {}",
            self.dir_manager.database_location().display()
        );

        let stored = if self.config.auth.attempt_last_user_authentication {
            self.credential_store
                .last_user_and_token(&self.config.auth.service_id)
        } else {
            None
        };

        match (stored, lsid.filter(|l| !l.is_empty())) {
            (Some(stored), _) => self.authenticate_for_user(&stored),
            (None, Some(lsid)) => self.run(Event::LsidSubmitted, &AuthMaterial::Lsid(lsid)),
            (None, None) => self.run(Event::NoCredentials, &AuthMaterial::None),
        }
        Ok(())
    }

    fn authenticate_for_user(&self, stored: &StoredCredentials) {
        info!("Reusing stored credentials for {}", stored.username);
        *lock(&self.username) = Some(stored.username.clone());

        // Opened before the token check completes so changes can be
        // processed as soon as it does.
        let directory = self.dir_manager.open(&stored.username);
        let event = Event::StoredCredentialsLoaded {
            initial_sync_ended: directory.initial_sync_ended(),
        };
        self.run(event, &AuthMaterial::Token(stored));
    }

    fn authenticate(&self, credentials: Credentials) -> Result<(), ClientError> {
        self.ensure_running()?;
        if let Some(current) = self.username() {
            if !current.eq_ignore_ascii_case(credentials.username()) {
                return Err(ClientError::UsernameChanged {
                    current,
                    requested: credentials.username().to_string(),
                });
            }
        }

        let event = Event::AuthenticateRequested {
            password_empty: credentials.password().is_empty(),
        };
        self.run(event, &AuthMaterial::Password(&credentials));
        Ok(())
    }

    fn handle_auth_event(&self, event: AuthWatcherEvent) {
        if self.is_shut_down() {
            debug!("Ignoring auth event after shutdown");
            return;
        }

        let event = match event {
            AuthWatcherEvent::AttemptStart => Event::AuthAttemptStarted,
            AuthWatcherEvent::Succeeded { user_email } => {
                info!("Authenticated as {}", user_email);
                Event::AuthSucceeded {
                    initial_sync_ended: self.bind_user(&user_email),
                }
            }
            other => match other.failure() {
                Some(error) => {
                    info!("Authentication failed: {:?}", error.state());
                    Event::AuthFailed(error)
                }
                None => Event::AuthOther,
            },
        };
        self.run(event, &AuthMaterial::None);
    }

    /// Bind the share to `user_email` unless it already has a user, open the
    /// directory, and report whether its initial sync has ended.
    fn bind_user(&self, user_email: &str) -> bool {
        let name = lock(&self.username)
            .get_or_insert_with(|| user_email.to_string())
            .clone();
        if !name.eq_ignore_ascii_case(user_email) {
            warn!(
                "Auth succeeded for {} but the share belongs to {}",
                user_email, name
            );
        }
        self.dir_manager.open(&name).initial_sync_ended()
    }

    /// Fold `event` into the session, then carry out the resulting actions
    /// with the session lock released.
    fn run(&self, event: Event, material: &AuthMaterial<'_>) {
        let actions = {
            let mut session = lock(&self.session);
            let (next, actions) = session.on_event(event);
            *session = next;
            actions
        };
        for action in actions {
            self.perform(action, material);
        }
    }

    fn perform(&self, action: Action, material: &AuthMaterial<'_>) {
        match action {
            Action::EmitAuthError(error) => {
                if let Some(observer) = self.observer() {
                    observer.on_auth_error(&error);
                }
            }
            Action::StartAuthentication => match material {
                AuthMaterial::Password(credentials) => self.auth_watcher.authenticate(credentials),
                _ => warn!("Authentication requested without credentials"),
            },
            Action::StartTokenAuthentication => match material {
                AuthMaterial::Token(stored) => self
                    .auth_watcher
                    .authenticate_with_token(&stored.username, &stored.token),
                _ => warn!("Token authentication requested without a stored token"),
            },
            Action::StartLsidAuthentication => match material {
                AuthMaterial::Lsid(lsid) => self.auth_watcher.authenticate_with_lsid(lsid),
                _ => warn!("LSID authentication requested without an LSID"),
            },
            Action::HookDirectoryChanges => self.hook_directory_changes(),
            Action::NotifyInitializationComplete => {
                info!("Sync manager initialization complete");
                if let Some(observer) = self.observer() {
                    observer.on_initialization_complete();
                }
            }
            Action::EmitSyncCycleCompleted => {
                if let Some(observer) = self.observer() {
                    observer.on_sync_cycle_completed();
                }
            }
            Action::SendPeerNotification => {
                debug!("Sending peer notification");
                let success = self.notifier.send_notification();
                if !success {
                    debug!("Peer notification not delivered; retrying after the next cycle");
                }
                self.run(Event::NotificationSent { success }, &AuthMaterial::None);
            }
        }
    }

    fn hook_directory_changes(&self) {
        let Some(name) = self.username() else {
            warn!("No user bound; directory changes not hooked");
            return;
        };
        let directory = self.dir_manager.open(&name);
        let listener: Weak<dyn DirectoryChangeListener> = self.me.clone();
        directory.set_change_listener(listener);
        debug!("Listening for changes to {:?}", name);
    }

    fn shutdown(&self) {
        {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.shut_down {
                return;
            }
            lifecycle.shut_down = true;
        }
        info!("Shutting down sync manager");

        self.auth_watcher.shutdown();

        let timeout = self.config.syncer.thread_exit_timeout();
        if !self.syncer.stop(timeout) {
            error!("Syncer did not stop within {:?}", timeout);
        }

        debug!("Notifier logout started");
        self.notifier.logout();

        if let Some(name) = self.username() {
            if let Some(directory) = self.dir_manager.get(&name) {
                self.dir_manager.close(&name);
                directory.clear_change_listener();
            }
        }

        if let Some(task) = lock(&self.address_watch).take() {
            task.abort();
        }
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        let lifecycle = *lock(&self.lifecycle);
        if lifecycle.shut_down {
            Err(ClientError::ShutDown)
        } else if !lifecycle.initialized {
            Err(SyncError::NotInitialized.into())
        } else {
            Ok(())
        }
    }

    fn is_shut_down(&self) -> bool {
        lock(&self.lifecycle).shut_down
    }

    fn username(&self) -> Option<String> {
        lock(&self.username).clone()
    }

    fn observer(&self) -> Option<Arc<dyn Observer>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A local edit: nudge the syncer if it left an API object dirty.
    /// Entries that were created and deleted within the transaction never
    /// existed as far as the server is concerned and are skipped.
    ///
    /// Local edits are never reported back to the observer.
    fn calculate_changes_from_sync_api(&self, event: &ChangeEvent<'_>) -> Vec<ChangeRecord> {
        lock(&self.change_buffer).discard_stale();

        let needs_sync = event.originals.iter().any(|(handle, original)| {
            event.kernel.get_by_handle(*handle).is_some_and(|entry| {
                !entry.is_root()
                    && entry.is_api_object
                    && entry.is_unsynced
                    && (!entry.is_del || !original.is_del)
            })
        });

        if needs_sync {
            let delay = self.config.syncer.nudge_delay();
            debug!("Local changes left unsynced entries; nudging syncer in {:?}", delay);
            self.syncer.nudge(delay, NudgeSource::Local);
        }
        Vec::new()
    }

    /// A syncer write: diff pre-images against the result and drain the
    /// buffer in tree order. The buffer is empty again before the write lock
    /// is released.
    fn calculate_changes_from_syncer(&self, event: &ChangeEvent<'_>) -> Vec<ChangeRecord> {
        let mut buffer = lock(&self.change_buffer);
        buffer.discard_stale();

        for (handle, original) in event.originals {
            let Some(entry) = event.kernel.get_by_handle(*handle) else {
                continue;
            };
            if entry.is_root() || !entry.is_api_object {
                continue;
            }

            let existed_before = !original.is_del;
            let exists_now = !entry.is_del;
            match (existed_before, exists_now) {
                (false, true) => buffer.push_added(*handle),
                (true, false) => buffer.push_deleted(*handle),
                (true, true) if original.visible_properties_differ(entry) => {
                    buffer.push_updated(*handle, original.position_differs(entry));
                }
                _ => {}
            }
        }

        let changes = buffer.get_all_changes_in_tree_order(event.kernel);
        buffer.clear();
        changes
    }
}

impl DirectoryChangeListener for SyncInternal {
    fn calculate_changes(&self, event: &ChangeEvent<'_>) -> Vec<ChangeRecord> {
        match event.writer {
            WriterTag::SyncApi => self.calculate_changes_from_sync_api(event),
            WriterTag::Syncer | WriterTag::Unittest => self.calculate_changes_from_syncer(event),
        }
    }

    fn transaction_complete(
        &self,
        directory: &Directory,
        _writer: WriterTag,
        changes: Vec<ChangeRecord>,
    ) {
        if changes.is_empty() {
            return;
        }
        let Some(observer) = self.observer() else {
            debug!("No observer; dropping {} applied changes", changes.len());
            return;
        };

        let trans = ReadTransaction::new(directory);
        debug!("Delivering {} applied changes", changes.len());
        observer.on_changes_applied(&trans, &changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCollaborators, RecordingObserver};

    fn manager() -> (SyncManager, MockCollaborators, RecordingObserver) {
        let mocks = MockCollaborators::new();
        let manager = SyncManager::new(SyncConfig::default(), mocks.collaborators());
        let observer = RecordingObserver::new();
        manager.set_observer(Arc::new(observer.clone()));
        (manager, mocks, observer)
    }

    #[test]
    fn init_without_credentials_asks_for_them() {
        let (manager, mocks, observer) = manager();
        manager.init(None).unwrap();

        assert_eq!(
            observer.last_auth_error().map(|e| e.state()),
            Some(AuthErrorState::CredentialsNeeded)
        );
        assert_eq!(manager.auth_problem(), AuthErrorState::CredentialsNeeded);
        assert!(mocks.auth_watcher.requests().is_empty());
    }

    #[test]
    fn init_twice_fails() {
        let (manager, _, _) = manager();
        manager.init(None).unwrap();
        assert!(matches!(manager.init(None), Err(ClientError::AlreadyInitialized)));
    }

    #[test]
    fn authenticate_requires_init() {
        let (manager, _, _) = manager();
        let err = manager
            .authenticate(Credentials::new("user", "pw"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Sync(SyncError::NotInitialized)));
    }

    #[test]
    fn user_share_is_gated_on_readiness() {
        let (manager, _, _) = manager();
        manager.init(None).unwrap();
        assert!(manager.user_share().is_err());

        manager.setup_for_test_mode("tester").unwrap();
        let share = manager.user_share().unwrap();
        assert_eq!(share.name(), "tester");
        assert!(share.has_change_listener());
    }

    #[test]
    fn shutdown_is_ordered_and_idempotent() {
        let (manager, mocks, _) = manager();
        manager.init(None).unwrap();
        manager.setup_for_test_mode("tester").unwrap();
        let share = manager.user_share().unwrap();

        manager.shutdown();
        manager.shutdown();

        assert!(mocks.auth_watcher.shutdown_called());
        assert_eq!(
            mocks.syncer.stop_timeouts(),
            vec![std::time::Duration::from_secs(60)]
        );
        assert!(mocks.notifier.logged_out());
        assert!(!share.has_change_listener());
        assert!(matches!(
            manager.authenticate(Credentials::new("tester", "pw")),
            Err(ClientError::ShutDown)
        ));
    }

    #[test]
    fn leftover_buffer_contents_are_never_delivered() {
        use crate::directory::WriteTransaction;
        use crate::node::{BaseNode, ReadNode, WriteNode};
        use treesync_types::MetaHandle;

        let (manager, _, observer) = manager();
        manager.init(None).unwrap();
        manager.setup_for_test_mode("tester").unwrap();
        let share = manager.user_share().unwrap();
        let stale = MetaHandle::new(4242);

        lock(&manager.inner.change_buffer).push_added(stale);
        {
            let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
            let root = ReadNode::init_by_root_lookup(&trans);
            WriteNode::init_by_creation(&trans, &root, None).unwrap();
        }
        assert!(lock(&manager.inner.change_buffer).is_empty());
        assert!(observer.change_lists().is_empty());

        lock(&manager.inner.change_buffer).push_added(stale);
        let created = {
            let trans = WriteTransaction::new(&share, WriterTag::Syncer);
            let root = ReadNode::init_by_root_lookup(&trans);
            WriteNode::init_by_creation(&trans, &root, None).unwrap().get_id()
        };
        assert!(lock(&manager.inner.change_buffer).is_empty());
        assert_eq!(
            observer.change_lists(),
            vec![vec![ChangeRecord::added(created)]]
        );
    }

    #[test]
    fn debug_does_not_panic() {
        let (manager, _, _) = manager();
        assert!(format!("{:?}", manager).contains("SyncManager"));
    }
}
