//! Mock collaborators for testing.
//!
//! Each mock records the calls it receives and lets a test script the
//! answers. Clones share state, so a test keeps one copy for inspection and
//! hands another to the [`SyncManager`](crate::SyncManager).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use treesync_types::{AuthError, ChangeRecord};

use crate::auth::{AuthWatcher, CredentialStore, Credentials, StoredCredentials};
use crate::connectivity::{ConnectionManager, ConnectionStatus};
use crate::directory::ReadTransaction;
use crate::manager::{Collaborators, Observer};
use crate::notifier::{NotificationStatus, PeerNotifier};
use crate::syncer::{NudgeSource, Syncer, SyncerStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One request received by [`MockAuthWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    /// Username and password. Only whether the password was empty is kept.
    Password {
        /// The account name.
        username: String,
        /// The password was empty.
        password_empty: bool,
        /// The captcha answer.
        captcha: String,
    },
    /// Stored token validation.
    Token {
        /// The account name.
        username: String,
    },
    /// LSID cookie.
    Lsid(String),
}

/// Mock auth watcher. Records requests; never answers on its own.
#[derive(Debug, Default)]
pub struct MockAuthWatcher {
    inner: Arc<Mutex<MockAuthWatcherInner>>,
}

#[derive(Debug, Default)]
struct MockAuthWatcherInner {
    requests: Vec<AuthRequest>,
    shutdown_called: bool,
}

impl MockAuthWatcher {
    /// Create a new mock auth watcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<AuthRequest> {
        lock(&self.inner).requests.clone()
    }

    /// Whether `shutdown` was called.
    pub fn shutdown_called(&self) -> bool {
        lock(&self.inner).shutdown_called
    }
}

impl Clone for MockAuthWatcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AuthWatcher for MockAuthWatcher {
    fn authenticate(&self, credentials: &Credentials) {
        lock(&self.inner).requests.push(AuthRequest::Password {
            username: credentials.username().to_string(),
            password_empty: credentials.password().is_empty(),
            captcha: credentials.captcha().to_string(),
        });
    }

    fn authenticate_with_token(&self, username: &str, _token: &str) {
        lock(&self.inner).requests.push(AuthRequest::Token {
            username: username.to_string(),
        });
    }

    fn authenticate_with_lsid(&self, lsid: &str) {
        lock(&self.inner)
            .requests
            .push(AuthRequest::Lsid(lsid.to_string()));
    }

    fn shutdown(&self) {
        lock(&self.inner).shutdown_called = true;
    }
}

/// Mock syncer. Records nudges and stop requests.
#[derive(Debug, Default)]
pub struct MockSyncer {
    inner: Arc<Mutex<MockSyncerInner>>,
}

#[derive(Debug, Default)]
struct MockSyncerInner {
    nudges: Vec<(Duration, NudgeSource)>,
    stop_timeouts: Vec<Duration>,
    fail_next_stop: bool,
    status: SyncerStatus,
}

impl MockSyncer {
    /// Create a new mock syncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// All nudges received so far.
    pub fn nudges(&self) -> Vec<(Duration, NudgeSource)> {
        lock(&self.inner).nudges.clone()
    }

    /// Number of nudges received so far.
    pub fn nudge_count(&self) -> usize {
        lock(&self.inner).nudges.len()
    }

    /// Timeouts passed to `stop`, in call order.
    pub fn stop_timeouts(&self) -> Vec<Duration> {
        lock(&self.inner).stop_timeouts.clone()
    }

    /// Cause the next `stop` to report a timeout.
    pub fn fail_next_stop(&self) {
        lock(&self.inner).fail_next_stop = true;
    }

    /// Set the counters `status` reports.
    pub fn set_status(&self, status: SyncerStatus) {
        lock(&self.inner).status = status;
    }
}

impl Clone for MockSyncer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Syncer for MockSyncer {
    fn nudge(&self, delay: Duration, source: NudgeSource) {
        lock(&self.inner).nudges.push((delay, source));
    }

    fn stop(&self, timeout: Duration) -> bool {
        let mut inner = lock(&self.inner);
        inner.stop_timeouts.push(timeout);
        !std::mem::take(&mut inner.fail_next_stop)
    }

    fn status(&self) -> SyncerStatus {
        lock(&self.inner).status
    }
}

/// Mock peer notifier.
#[derive(Debug, Default)]
pub struct MockNotifier {
    inner: Arc<Mutex<MockNotifierInner>>,
}

#[derive(Debug, Default)]
struct MockNotifierInner {
    attempts: usize,
    failures_remaining: usize,
    logged_out: bool,
    status: NotificationStatus,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send attempts so far, including failed ones.
    pub fn attempts(&self) -> usize {
        lock(&self.inner).attempts
    }

    /// Successful sends so far.
    pub fn sent(&self) -> u64 {
        lock(&self.inner).status.notifications_sent
    }

    /// Cause the next `count` sends to fail.
    pub fn fail_next_sends(&self, count: usize) {
        lock(&self.inner).failures_remaining = count;
    }

    /// Whether `logout` was called.
    pub fn logged_out(&self) -> bool {
        lock(&self.inner).logged_out
    }
}

impl Clone for MockNotifier {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PeerNotifier for MockNotifier {
    fn send_notification(&self) -> bool {
        let mut inner = lock(&self.inner);
        inner.attempts += 1;
        if inner.failures_remaining > 0 {
            inner.failures_remaining -= 1;
            return false;
        }
        inner.status.notifications_sent += 1;
        true
    }

    fn logout(&self) {
        let mut inner = lock(&self.inner);
        inner.logged_out = true;
        inner.status.notifications_enabled = false;
    }

    fn status(&self) -> NotificationStatus {
        lock(&self.inner).status
    }
}

/// Mock credential store holding at most one user.
#[derive(Debug, Default)]
pub struct MockCredentialStore {
    inner: Arc<Mutex<Option<StoredCredentials>>>,
}

impl MockCredentialStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store remembering `username` with `token`.
    pub fn with_last_user(username: &str, token: &str) -> Self {
        let store = Self::default();
        *lock(&store.inner) = Some(StoredCredentials {
            username: username.to_string(),
            token: token.to_string(),
        });
        store
    }
}

impl Clone for MockCredentialStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl CredentialStore for MockCredentialStore {
    fn last_user_and_token(&self, _service_id: &str) -> Option<StoredCredentials> {
        lock(&self.inner).clone()
    }
}

/// Mock connection manager.
#[derive(Debug, Default)]
pub struct MockConnectionManager {
    inner: Arc<Mutex<MockConnectionInner>>,
}

#[derive(Debug, Default)]
struct MockConnectionInner {
    checks: usize,
    status: ConnectionStatus,
}

impl MockConnectionManager {
    /// Create a new mock connection manager reporting the server as down.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection manager reporting a healthy server.
    pub fn online() -> Self {
        let manager = Self::default();
        manager.set_status(ConnectionStatus {
            server_reachable: true,
            server_up: true,
            server_broken: false,
        });
        manager
    }

    /// Set what `status` reports.
    pub fn set_status(&self, status: ConnectionStatus) {
        lock(&self.inner).status = status;
    }

    /// Number of reachability checks requested.
    pub fn checks(&self) -> usize {
        lock(&self.inner).checks
    }
}

impl Clone for MockConnectionManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConnectionManager for MockConnectionManager {
    fn check_server_reachable(&self) {
        lock(&self.inner).checks += 1;
    }

    fn status(&self) -> ConnectionStatus {
        lock(&self.inner).status
    }
}

/// Observer that records every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    inner: Arc<Mutex<RecordingObserverInner>>,
}

#[derive(Debug, Default)]
struct RecordingObserverInner {
    change_lists: Vec<Vec<ChangeRecord>>,
    initialization_completions: usize,
    auth_errors: Vec<AuthError>,
    sync_cycles_completed: usize,
}

impl RecordingObserver {
    /// Create a new recording observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every change list delivered, in delivery order.
    pub fn change_lists(&self) -> Vec<Vec<ChangeRecord>> {
        lock(&self.inner).change_lists.clone()
    }

    /// How many times initialization completion was reported.
    pub fn initialization_completions(&self) -> usize {
        lock(&self.inner).initialization_completions
    }

    /// Every auth error delivered, including "no error" reports.
    pub fn auth_errors(&self) -> Vec<AuthError> {
        lock(&self.inner).auth_errors.clone()
    }

    /// The last auth error delivered.
    pub fn last_auth_error(&self) -> Option<AuthError> {
        lock(&self.inner).auth_errors.last().cloned()
    }

    /// How many completed sync cycles were reported.
    pub fn sync_cycles_completed(&self) -> usize {
        lock(&self.inner).sync_cycles_completed
    }
}

impl Clone for RecordingObserver {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Observer for RecordingObserver {
    fn on_changes_applied(&self, _trans: &ReadTransaction<'_>, changes: &[ChangeRecord]) {
        lock(&self.inner).change_lists.push(changes.to_vec());
    }

    fn on_initialization_complete(&self) {
        lock(&self.inner).initialization_completions += 1;
    }

    fn on_auth_error(&self, error: &AuthError) {
        lock(&self.inner).auth_errors.push(error.clone());
    }

    fn on_sync_cycle_completed(&self) {
        lock(&self.inner).sync_cycles_completed += 1;
    }
}

/// One of each mock, wired up as [`Collaborators`].
#[derive(Debug, Default, Clone)]
pub struct MockCollaborators {
    /// The auth watcher.
    pub auth_watcher: MockAuthWatcher,
    /// The syncer.
    pub syncer: MockSyncer,
    /// The peer notifier.
    pub notifier: MockNotifier,
    /// The connection manager.
    pub connection: MockConnectionManager,
    /// The credential store.
    pub credential_store: MockCredentialStore,
}

impl MockCollaborators {
    /// Fresh mocks with an empty credential store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh mocks whose credential store remembers `username`.
    pub fn with_last_user(username: &str, token: &str) -> Self {
        Self {
            credential_store: MockCredentialStore::with_last_user(username, token),
            ..Self::default()
        }
    }

    /// Handles for a [`SyncManager`](crate::SyncManager). The mocks keep
    /// sharing state with `self`.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            auth_watcher: Arc::new(self.auth_watcher.clone()),
            syncer: Arc::new(self.syncer.clone()),
            notifier: Arc::new(self.notifier.clone()),
            connection: Arc::new(self.connection.clone()),
            credential_store: Arc::new(self.credential_store.clone()),
        }
    }
}
