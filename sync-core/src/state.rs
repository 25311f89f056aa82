//! Session state machine for treesync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! authentication and initialization lifecycle of a sync session. The state
//! machine takes events as input and produces a new state plus a list of
//! actions to execute.
//!
//! The actual work (talking to the auth watcher, nudging the syncer, calling
//! the observer) is performed by sync-client, not by this module. Because the
//! coordinator feeds every event through one mutex-guarded instance, the
//! transition into [`Phase::Ready`] happens once no matter how many threads
//! race to report the last missing signal.

use treesync_types::{AuthError, AuthErrorState};

/// Coarse lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing has happened yet.
    #[default]
    Uninitialized,
    /// Some form of authentication has been started.
    Authenticating,
    /// Authenticated and the initial sync has ended. Terminal.
    Ready,
}

/// Session state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    phase: Phase,
    authenticated: bool,
    initial_sync_ended: bool,
    auth_problem: AuthErrorState,
    notification_pending: bool,
}

impl SessionState {
    /// Create a new state machine in the Uninitialized phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(mut self, event: Event) -> (Self, Vec<Action>) {
        let mut actions = Vec::new();

        match event {
            Event::AuthenticateRequested { password_empty } => {
                if self.authenticated {
                    return (self, actions);
                }
                self.enter_authenticating();
                if password_empty {
                    self.raise(AuthError::new(AuthErrorState::CredentialsNeeded), &mut actions);
                }
                actions.push(Action::StartAuthentication);
            }

            Event::StoredCredentialsLoaded { initial_sync_ended } => {
                self.enter_authenticating();
                self.initial_sync_ended |= initial_sync_ended;
                actions.push(Action::StartTokenAuthentication);
            }

            Event::LsidSubmitted => {
                self.enter_authenticating();
                actions.push(Action::StartLsidAuthentication);
            }

            Event::NoCredentials => {
                self.raise(AuthError::new(AuthErrorState::CredentialsNeeded), &mut actions);
            }

            // An attempt starting says nothing about an existing problem.
            Event::AuthAttemptStarted => {}

            Event::AuthSucceeded { initial_sync_ended } => {
                self.auth_problem = AuthErrorState::None;
                self.authenticated = true;
                self.initial_sync_ended |= initial_sync_ended;
                actions.push(Action::EmitAuthError(AuthError::none()));
                actions.push(Action::HookDirectoryChanges);
                self.try_ready(&mut actions);
            }

            Event::AuthFailed(error) => {
                self.auth_problem = AuthErrorState::None;
                self.raise(error, &mut actions);
            }

            Event::AuthOther => {
                self.auth_problem = AuthErrorState::None;
            }

            Event::TestModeEntered => {
                self.authenticated = true;
                self.initial_sync_ended = true;
                actions.push(Action::HookDirectoryChanges);
                self.try_ready(&mut actions);
            }

            Event::SyncerSnapshot(snapshot) => {
                if self.phase != Phase::Ready {
                    if snapshot.is_share_usable {
                        self.initial_sync_ended = true;
                        self.try_ready(&mut actions);
                    }
                    return (self, actions);
                }

                if snapshot.cycle_ended {
                    if !snapshot.has_more_to_sync {
                        actions.push(Action::EmitSyncCycleCompleted);
                    }
                    if snapshot.successful_commits > 0 {
                        self.notification_pending = true;
                    }
                    if self.notification_pending {
                        actions.push(Action::SendPeerNotification);
                    }
                }
            }

            Event::NotificationSent { success } => {
                if success {
                    self.notification_pending = false;
                }
            }
        }

        (self, actions)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the session reached [`Phase::Ready`].
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Whether authentication has succeeded at least once.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the initial download is known to be complete.
    pub fn initial_sync_ended(&self) -> bool {
        self.initial_sync_ended
    }

    /// The last authentication problem, `None` when healthy.
    pub fn auth_problem(&self) -> AuthErrorState {
        self.auth_problem
    }

    /// Whether a peer notification is owed.
    pub fn notification_pending(&self) -> bool {
        self.notification_pending
    }

    fn enter_authenticating(&mut self) {
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::Authenticating;
        }
    }

    fn raise(&mut self, error: AuthError, actions: &mut Vec<Action>) {
        self.auth_problem = error.state();
        actions.push(Action::EmitAuthError(error));
    }

    fn try_ready(&mut self, actions: &mut Vec<Action>) {
        if self.phase != Phase::Ready && self.authenticated && self.initial_sync_ended {
            self.phase = Phase::Ready;
            actions.push(Action::NotifyInitializationComplete);
        }
    }
}

/// What the syncer reported at the end of (or during) a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncerSnapshot {
    /// The share holds enough data to be presented.
    pub is_share_usable: bool,
    /// This report marks the end of a sync cycle.
    pub cycle_ended: bool,
    /// More work is known to be waiting.
    pub has_more_to_sync: bool,
    /// Items committed to the server during the cycle.
    pub successful_commits: u32,
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller submitted a username and password.
    AuthenticateRequested {
        /// The submitted password was empty.
        password_empty: bool,
    },
    /// A last-known user and token were found in the credential store.
    StoredCredentialsLoaded {
        /// The stored directory already finished its initial download.
        initial_sync_ended: bool,
    },
    /// Caller submitted an LSID.
    LsidSubmitted,
    /// Init found nothing to authenticate with.
    NoCredentials,
    /// The auth watcher began an attempt.
    AuthAttemptStarted,
    /// The auth watcher accepted the credentials.
    AuthSucceeded {
        /// The opened directory already finished its initial download.
        initial_sync_ended: bool,
    },
    /// The auth watcher rejected the credentials or could not reach the service.
    AuthFailed(AuthError),
    /// Any auth watcher event the session does not track.
    AuthOther,
    /// The session was forced ready for tests.
    TestModeEntered,
    /// The syncer reported progress.
    SyncerSnapshot(SyncerSnapshot),
    /// The notifier finished a send attempt.
    NotificationSent {
        /// Whether the peers were reached.
        success: bool,
    },
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Report an authentication state (possibly "no problem") to the observer.
    EmitAuthError(AuthError),
    /// Hand username and password to the auth watcher.
    StartAuthentication,
    /// Hand the stored token to the auth watcher for validation.
    StartTokenAuthentication,
    /// Hand the LSID to the auth watcher.
    StartLsidAuthentication,
    /// Start listening to directory change notifications.
    HookDirectoryChanges,
    /// Tell the observer initialization is complete. Emitted exactly once.
    NotifyInitializationComplete,
    /// Tell the observer a sync cycle finished with nothing left to do.
    EmitSyncCycleCompleted,
    /// Ask the notifier to tell peers about committed changes.
    SendPeerNotification,
}
