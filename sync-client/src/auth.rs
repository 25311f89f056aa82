//! Authentication collaborator contracts.
//!
//! The network side of authentication (talking to the account service,
//! validating tokens) lives behind [`AuthWatcher`]. It reports back through
//! [`AuthWatcherEvent`]s, which the coordinator translates into session state
//! changes and observer notifications.

use std::fmt;
use treesync_types::{AuthError, AuthErrorState, CaptchaChallenge};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Username, password and optional captcha answer.
///
/// Zeroized on drop; never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
    captcha: String,
}

impl Credentials {
    /// Credentials without a captcha answer.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            captcha: String::new(),
        }
    }

    /// Attach a captcha answer.
    pub fn with_captcha(mut self, captcha: &str) -> Self {
        self.captcha = captcha.to_string();
        self
    }

    /// The account name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The captcha answer, empty if none.
    pub fn captcha(&self) -> &str {
        &self.captcha
    }
}

// Don't leak secrets in debug output
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("captcha", &"[REDACTED]")
            .finish()
    }
}

/// A last-known user and service token, loaded from the credential store.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StoredCredentials {
    /// The account name.
    pub username: String,
    /// Service token from the last successful authentication.
    pub token: String,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Persisted settings holding the last user to sign in.
pub trait CredentialStore: Send + Sync {
    /// The last user and token saved for `service_id`, if any.
    fn last_user_and_token(&self, service_id: &str) -> Option<StoredCredentials>;
}

/// Performs authentication against the account service.
///
/// Every method returns immediately; outcomes arrive later as
/// [`AuthWatcherEvent`]s passed to `SyncManager::handle_auth_event`.
pub trait AuthWatcher: Send + Sync {
    /// Authenticate with a username and password.
    fn authenticate(&self, credentials: &Credentials);

    /// Validate a stored service token.
    fn authenticate_with_token(&self, username: &str, token: &str);

    /// Authenticate with an LSID cookie.
    fn authenticate_with_lsid(&self, lsid: &str);

    /// Stop any work in flight. No events follow.
    fn shutdown(&self);
}

/// Why the account service refused credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GaiaFailure {
    /// The service wants a captcha solved first.
    CaptchaRequired(CaptchaChallenge),
    /// The service could not be reached.
    ConnectionUnavailable,
    /// Wrong username or password.
    BadCredentials,
}

/// Outcome reports from the [`AuthWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthWatcherEvent {
    /// An attempt began.
    AttemptStart,
    /// The credentials were accepted.
    Succeeded {
        /// The account that signed in.
        user_email: String,
    },
    /// The account service refused the credentials.
    GaiaAuthFailed(GaiaFailure),
    /// The sync service refused the token; it has probably expired.
    ServiceAuthFailed,
    /// The account exists but has not signed up for sync.
    ServiceUserNotSignedUp,
    /// The sync service could not be reached.
    ServiceConnectionFailed,
    /// Anything else the watcher reports.
    Other,
}

impl AuthWatcherEvent {
    /// The error to surface for a failure event. `None` for events that are
    /// not failures.
    pub fn failure(&self) -> Option<AuthError> {
        let state = match self {
            AuthWatcherEvent::GaiaAuthFailed(GaiaFailure::CaptchaRequired(challenge)) => {
                return Some(AuthError::from_captcha_challenge(challenge.clone()));
            }
            AuthWatcherEvent::GaiaAuthFailed(GaiaFailure::ConnectionUnavailable) => {
                AuthErrorState::ConnectionFailed
            }
            AuthWatcherEvent::GaiaAuthFailed(GaiaFailure::BadCredentials) => {
                AuthErrorState::InvalidGaiaCredentials
            }
            AuthWatcherEvent::ServiceAuthFailed => AuthErrorState::InvalidGaiaCredentials,
            AuthWatcherEvent::ServiceUserNotSignedUp => AuthErrorState::UserNotSignedUp,
            AuthWatcherEvent::ServiceConnectionFailed => AuthErrorState::ConnectionFailed,
            AuthWatcherEvent::AttemptStart
            | AuthWatcherEvent::Succeeded { .. }
            | AuthWatcherEvent::Other => return None,
        };
        Some(AuthError::new(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("user@example.com", "hunter2").with_captcha("abc");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user@example.com"));
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("abc"));
    }

    #[test]
    fn stored_credentials_debug_is_redacted() {
        let stored = StoredCredentials {
            username: "user".into(),
            token: "secret-token".into(),
        };
        let debug = format!("{:?}", stored);
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn credentials_zeroize() {
        let mut creds = Credentials::new("user", "pw");
        creds.zeroize();
        assert!(creds.username().is_empty());
        assert!(creds.password().is_empty());
    }

    #[test]
    fn failure_mapping() {
        let cases = [
            (
                AuthWatcherEvent::GaiaAuthFailed(GaiaFailure::BadCredentials),
                AuthErrorState::InvalidGaiaCredentials,
            ),
            (
                AuthWatcherEvent::GaiaAuthFailed(GaiaFailure::ConnectionUnavailable),
                AuthErrorState::ConnectionFailed,
            ),
            (
                AuthWatcherEvent::ServiceAuthFailed,
                AuthErrorState::InvalidGaiaCredentials,
            ),
            (
                AuthWatcherEvent::ServiceUserNotSignedUp,
                AuthErrorState::UserNotSignedUp,
            ),
            (
                AuthWatcherEvent::ServiceConnectionFailed,
                AuthErrorState::ConnectionFailed,
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(event.failure().map(|e| e.state()), Some(expected));
        }
    }

    #[test]
    fn captcha_failure_keeps_challenge() {
        let challenge = CaptchaChallenge {
            token: "t".into(),
            image_url: "https://accounts.example.com/captcha".into(),
            unlock_url: "https://accounts.example.com/unlock".into(),
        };
        let event = AuthWatcherEvent::GaiaAuthFailed(GaiaFailure::CaptchaRequired(challenge.clone()));
        let error = event.failure().unwrap();
        assert_eq!(error.state(), AuthErrorState::CaptchaRequired);
        assert_eq!(error.captcha(), Some(&challenge));
    }

    #[test]
    fn non_failures_map_to_none() {
        assert!(AuthWatcherEvent::AttemptStart.failure().is_none());
        assert!(AuthWatcherEvent::Other.failure().is_none());
        assert!(AuthWatcherEvent::Succeeded {
            user_email: "u".into()
        }
        .failure()
        .is_none());
    }
}
