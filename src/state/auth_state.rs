/// Authentication state definitions for one source family
///
/// This module defines the login state machine driven by the authentication
/// controller, and the tri-state session status the orchestrator keeps per
/// family for the lifetime of the browser context.
use crate::AuthError;
use std::fmt;

/// Position of a login attempt in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    // ===== Active States =====
    /// Nothing has been tried yet
    Unauthenticated,

    /// The login form is on screen
    FormPresented,

    /// Credentials were typed and submitted
    CredentialsSubmitted,

    /// Waiting, with a deadline, for a human to clear a challenge or 2FA step
    ChallengePending,

    // ===== Terminal States =====
    /// Signed in
    Authenticated,

    /// Gave up on signing in; continue as a guest
    GuestFallback,
}

/// Observation that moves the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// The signed-in probe matched before any login step
    AlreadySignedIn,

    /// The login form rendered
    FormShown,

    /// The login form never rendered (bot wall, changed markup)
    FormUnavailable,

    /// Credentials were entered and submitted
    CredentialsEntered,

    /// No credentials are configured; the operator must log in by hand
    CredentialsUnavailable,

    /// The signed-in probe matched
    SignedIn,

    /// Submission did not sign in; a challenge or second factor is pending
    ChallengeDetected,

    /// The challenge deadline passed
    DeadlineElapsed,
}

impl AuthState {
    /// Applies an event, returning the next state
    ///
    /// # Returns
    ///
    /// * `Ok(AuthState)` - The state after the event
    /// * `Err(AuthError::InvalidTransition)` - The event is not legal here
    pub fn on(self, event: AuthEvent) -> Result<AuthState, AuthError> {
        use AuthEvent::*;
        use AuthState::*;

        let next = match (self, event) {
            (Unauthenticated, AlreadySignedIn) => Authenticated,
            (Unauthenticated, FormShown) => FormPresented,
            (Unauthenticated, FormUnavailable) => ChallengePending,
            (FormPresented, CredentialsEntered) => CredentialsSubmitted,
            (FormPresented, CredentialsUnavailable) => ChallengePending,
            (CredentialsSubmitted, SignedIn) => Authenticated,
            (CredentialsSubmitted, ChallengeDetected) => ChallengePending,
            (ChallengePending, SignedIn) => Authenticated,
            (ChallengePending, DeadlineElapsed) => GuestFallback,
            (from, event) => return Err(AuthError::InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Returns true once no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated | Self::GuestFallback)
    }

    /// Returns true while a bounded wait is running
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::ChallengePending)
    }

    /// Collapses a terminal state into the session status kept for the run
    pub fn session_status(&self) -> Option<SessionStatus> {
        match self {
            Self::Authenticated => Some(SessionStatus::Authenticated),
            Self::GuestFallback => Some(SessionStatus::GuestFallback),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::FormPresented => "form_presented",
            Self::CredentialsSubmitted => "credentials_submitted",
            Self::ChallengePending => "challenge_pending",
            Self::Authenticated => "authenticated",
            Self::GuestFallback => "guest_fallback",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-family session status for the run's browser context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    Authenticated,
    GuestFallback,
}

impl SessionStatus {
    /// Returns true when a login attempt has already been resolved this run
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::GuestFallback => "guest",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[AuthEvent]) -> Result<AuthState, AuthError> {
        events
            .iter()
            .try_fold(AuthState::Unauthenticated, |state, event| state.on(*event))
    }

    #[test]
    fn test_happy_path() {
        let end = run(&[
            AuthEvent::FormShown,
            AuthEvent::CredentialsEntered,
            AuthEvent::SignedIn,
        ])
        .unwrap();
        assert_eq!(end, AuthState::Authenticated);
    }

    #[test]
    fn test_already_signed_in() {
        assert_eq!(
            run(&[AuthEvent::AlreadySignedIn]).unwrap(),
            AuthState::Authenticated
        );
    }

    #[test]
    fn test_challenge_then_operator_clears_it() {
        let end = run(&[
            AuthEvent::FormShown,
            AuthEvent::CredentialsEntered,
            AuthEvent::ChallengeDetected,
            AuthEvent::SignedIn,
        ])
        .unwrap();
        assert_eq!(end, AuthState::Authenticated);
    }

    #[test]
    fn test_challenge_times_out_to_guest() {
        let end = run(&[
            AuthEvent::FormShown,
            AuthEvent::CredentialsEntered,
            AuthEvent::ChallengeDetected,
            AuthEvent::DeadlineElapsed,
        ])
        .unwrap();
        assert_eq!(end, AuthState::GuestFallback);
        assert_eq!(end.session_status(), Some(SessionStatus::GuestFallback));
    }

    #[test]
    fn test_missing_form_goes_to_bounded_wait() {
        assert_eq!(
            run(&[AuthEvent::FormUnavailable]).unwrap(),
            AuthState::ChallengePending
        );
        assert_eq!(
            run(&[AuthEvent::FormShown, AuthEvent::CredentialsUnavailable]).unwrap(),
            AuthState::ChallengePending
        );
    }

    #[test]
    fn test_every_waiting_state_can_reach_a_terminal() {
        let pending = AuthState::ChallengePending;
        assert!(pending.on(AuthEvent::DeadlineElapsed).unwrap().is_terminal());
        assert!(pending.on(AuthEvent::SignedIn).unwrap().is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(AuthState::Unauthenticated
            .on(AuthEvent::CredentialsEntered)
            .is_err());
        assert!(AuthState::Authenticated.on(AuthEvent::SignedIn).is_err());
        assert!(AuthState::GuestFallback.on(AuthEvent::FormShown).is_err());
        assert!(AuthState::FormPresented
            .on(AuthEvent::DeadlineElapsed)
            .is_err());
    }

    #[test]
    fn test_session_status() {
        assert!(!SessionStatus::default().is_settled());
        assert!(SessionStatus::Authenticated.is_settled());
        assert!(SessionStatus::GuestFallback.is_settled());
        assert_eq!(AuthState::FormPresented.session_status(), None);
        assert_eq!(format!("{}", AuthState::ChallengePending), "challenge_pending");
    }
}
