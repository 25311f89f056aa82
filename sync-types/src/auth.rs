//! Authentication problem reporting.

use serde::{Deserialize, Serialize};

/// The coarse authentication state surfaced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthErrorState {
    /// No problem; authentication is healthy.
    #[default]
    None,
    /// No usable credentials exist; the embedder has to collect some.
    CredentialsNeeded,
    /// The submitted or cached credentials were rejected.
    InvalidGaiaCredentials,
    /// The account is valid but not signed up for sync.
    UserNotSignedUp,
    /// The authentication service could not be reached.
    ConnectionFailed,
    /// The service wants a captcha solved before accepting credentials.
    CaptchaRequired,
}

/// Captcha details attached to [`AuthErrorState::CaptchaRequired`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// Token to echo back with the solved captcha.
    pub token: String,
    /// Where the captcha image lives.
    pub image_url: String,
    /// Where the user can unlock the account instead.
    pub unlock_url: String,
}

/// An authentication error as seen by the observer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthError {
    state: AuthErrorState,
    captcha: Option<CaptchaChallenge>,
}

impl AuthError {
    /// The "no problem" value.
    pub fn none() -> Self {
        Self::default()
    }

    /// An error in the given state with no captcha attached.
    pub fn new(state: AuthErrorState) -> Self {
        Self {
            state,
            captcha: None,
        }
    }

    /// A captcha challenge.
    pub fn from_captcha_challenge(challenge: CaptchaChallenge) -> Self {
        Self {
            state: AuthErrorState::CaptchaRequired,
            captcha: Some(challenge),
        }
    }

    /// The error state.
    pub fn state(&self) -> AuthErrorState {
        self.state
    }

    /// Captcha details, if this is a captcha challenge.
    pub fn captcha(&self) -> Option<&CaptchaChallenge> {
        self.captcha.as_ref()
    }

    /// Whether this value represents "no problem".
    pub fn is_none(&self) -> bool {
        self.state == AuthErrorState::None
    }
}

impl From<AuthErrorState> for AuthError {
    fn from(state: AuthErrorState) -> Self {
        Self::new(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_none() {
        assert!(AuthError::default().is_none());
        assert!(AuthError::none().captcha().is_none());
    }

    #[test]
    fn captcha_challenge_carries_details() {
        let err = AuthError::from_captcha_challenge(CaptchaChallenge {
            token: "tok".into(),
            image_url: "https://example.com/c.png".into(),
            unlock_url: "https://example.com/unlock".into(),
        });
        assert_eq!(err.state(), AuthErrorState::CaptchaRequired);
        assert_eq!(err.captcha().map(|c| c.token.as_str()), Some("tok"));
    }

    #[test]
    fn credentials_needed_is_distinct_from_invalid_credentials() {
        assert_ne!(
            AuthError::new(AuthErrorState::CredentialsNeeded),
            AuthError::new(AuthErrorState::InvalidGaiaCredentials)
        );
    }
}
