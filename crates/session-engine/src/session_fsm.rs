//! Session state machine using rust-fsm.
//!
//! The machine is the only place that decides which session transitions are
//! legal. States carry data (the active session, the last login error), so the
//! transition table is a hand-written `StateMachineImpl` instead of the
//! `state_machine!` DSL.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  BootWithoutSession   ┌─────────────────────┐
//! │     Booting     │ ────────────────────► │  Unauthenticated    │◄─┐
//! └────────┬────────┘                       │  (last error?)      │  │ ClearError
//!          │ BootWithStoredSession          └──┬───────────────┬──┘──┘
//!          ▼                                   │ LoginSubmitted│ ▲
//! ┌─────────────────┐ ◄────────────────────────┘               │ │ VerificationFailed
//! │ Authenticating  │ ─────────────────────────────────────────┼─┘ LoginFailed
//! └────────┬────────┘                                          │   RefreshFailed
//!          │ VerificationSucceeded / LoginSucceeded            │
//!          ▼                                                   │
//! ┌─────────────────┐  LogoutRequested / RefreshFailed         │
//! │  Authenticated  │ ─────────────────────────────────────────┘
//! │   (session)     │ ─┐ RefreshSucceeded (tokens replaced)
//! └────────┬────────┘ ◄┘
//!          │ LoginSubmitted ──► Authenticating
//! ```

use crate::models::{Session, TokenPair};
use rust_fsm::{StateMachine, StateMachineImpl};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authoritative session state. Exactly one variant is active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Initial; stored credentials not yet examined.
    Booting,
    /// Login or boot verification in flight.
    Authenticating,
    /// Signed in.
    Authenticated(Session),
    /// Signed out, optionally with the message of the failed login.
    Unauthenticated(Option<String>),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from(self)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Active session, if authenticated.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Message of the last failed login, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            SessionState::Unauthenticated(error) => error.as_deref(),
            _ => None,
        }
    }
}

/// Inputs accepted by the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// App start found tokens and a profile in the store.
    BootWithStoredSession,
    /// App start found no usable stored session.
    BootWithoutSession,
    /// `auth/me` confirmed the stored session.
    VerificationSucceeded(Session),
    /// `auth/me` rejected the stored session or could not be reached.
    VerificationFailed,
    LoginSubmitted,
    LoginSucceeded(Session),
    LoginFailed(String),
    LogoutRequested,
    /// Tokens replaced by a background refresh.
    RefreshSucceeded(TokenPair),
    /// The refresh token itself was rejected.
    RefreshFailed,
    ClearError,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::BootWithStoredSession => "boot_with_stored_session",
            SessionEvent::BootWithoutSession => "boot_without_session",
            SessionEvent::VerificationSucceeded(_) => "verification_succeeded",
            SessionEvent::VerificationFailed => "verification_failed",
            SessionEvent::LoginSubmitted => "login_submitted",
            SessionEvent::LoginSucceeded(_) => "login_succeeded",
            SessionEvent::LoginFailed(_) => "login_failed",
            SessionEvent::LogoutRequested => "logout_requested",
            SessionEvent::RefreshSucceeded(_) => "refresh_succeeded",
            SessionEvent::RefreshFailed => "refresh_failed",
            SessionEvent::ClearError => "clear_error",
        }
    }
}

/// Pure transition function. `None` means the event is not legal in `state`.
pub fn transition(state: &SessionState, event: &SessionEvent) -> Option<SessionState> {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Booting, E::BootWithStoredSession) => Some(S::Authenticating),
        (S::Booting, E::BootWithoutSession) => Some(S::Unauthenticated(None)),

        (S::Authenticating, E::VerificationSucceeded(session)) => {
            Some(S::Authenticated(session.clone()))
        }
        (S::Authenticating, E::VerificationFailed) => Some(S::Unauthenticated(None)),

        (S::Unauthenticated(_) | S::Authenticated(_), E::LoginSubmitted) => Some(S::Authenticating),
        (S::Authenticating, E::LoginSucceeded(session)) => Some(S::Authenticated(session.clone())),
        (S::Authenticating, E::LoginFailed(message)) => {
            Some(S::Unauthenticated(Some(message.clone())))
        }

        (S::Authenticated(_), E::LogoutRequested) => Some(S::Unauthenticated(None)),

        (S::Authenticated(session), E::RefreshSucceeded(tokens)) => {
            Some(S::Authenticated(session.with_tokens(tokens.clone())))
        }
        (S::Authenticated(_), E::RefreshFailed) => Some(S::Unauthenticated(None)),
        // Boot verification may itself hit an expired access token.
        (S::Authenticating, E::RefreshSucceeded(_)) => Some(S::Authenticating),
        (S::Authenticating, E::RefreshFailed) => Some(S::Unauthenticated(None)),

        (S::Unauthenticated(_), E::ClearError) => Some(S::Unauthenticated(None)),

        _ => None,
    }
}

/// rust-fsm binding for the session transition table.
pub struct SessionMachineImpl;

impl StateMachineImpl for SessionMachineImpl {
    type Input = SessionEvent;
    type State = SessionState;
    type Output = ();
    const INITIAL_STATE: Self::State = SessionState::Booting;

    fn transition(state: &Self::State, input: &Self::Input) -> Option<Self::State> {
        transition(state, input)
    }

    fn output(_state: &Self::State, _input: &Self::Input) -> Option<Self::Output> {
        None
    }
}

pub type SessionMachine = StateMachine<SessionMachineImpl>;

/// Data-free view of the session state for notifications and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Booting,
    Authenticating,
    Authenticated,
    Unauthenticated,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Booting => "booting",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::Unauthenticated => "unauthenticated",
        }
    }

    /// Returns true once the machine has settled (Authenticated or Unauthenticated).
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            SessionPhase::Authenticated | SessionPhase::Unauthenticated
        )
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::Authenticated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SessionState> for SessionPhase {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Booting => SessionPhase::Booting,
            SessionState::Authenticating => SessionPhase::Authenticating,
            SessionState::Authenticated(_) => SessionPhase::Authenticated,
            SessionState::Unauthenticated(_) => SessionPhase::Unauthenticated,
        }
    }
}

/// Payload for session state change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateChangedPayload {
    /// Current session phase.
    pub state: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Message of the last failed login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SessionState> for SessionStateChangedPayload {
    fn from(state: &SessionState) -> Self {
        let profile = state.session().map(|session| &session.profile);
        Self {
            state: state.phase(),
            admin_id: profile.map(|p| p.admin_id.clone()),
            username: profile.map(|p| p.username.clone()),
            error: state.error().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use token_store::{AdminProfile, AdminRole};

    fn session(access: &str) -> Session {
        Session::new(
            TokenPair::new(access, "refresh"),
            AdminProfile {
                admin_id: "adm_1".to_string(),
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                role: AdminRole::Admin,
                display_name: "Admin".to_string(),
                permissions: BTreeMap::new(),
            },
        )
    }

    fn authenticated_machine() -> SessionMachine {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionEvent::BootWithoutSession).unwrap();
        machine.consume(&SessionEvent::LoginSubmitted).unwrap();
        machine
            .consume(&SessionEvent::LoginSucceeded(session("a1")))
            .unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_booting() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionState::Booting);
        assert!(!machine.state().phase().is_resolved());
    }

    #[test]
    fn test_boot_without_session() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionEvent::BootWithoutSession).unwrap();
        assert_eq!(*machine.state(), SessionState::Unauthenticated(None));
    }

    #[test]
    fn test_boot_verification_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionEvent::BootWithStoredSession).unwrap();
        assert_eq!(*machine.state(), SessionState::Authenticating);

        machine
            .consume(&SessionEvent::VerificationSucceeded(session("a1")))
            .unwrap();
        assert_eq!(*machine.state(), SessionState::Authenticated(session("a1")));
    }

    #[test]
    fn test_boot_verification_failure_resolves() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionEvent::BootWithStoredSession).unwrap();
        machine.consume(&SessionEvent::VerificationFailed).unwrap();
        assert_eq!(*machine.state(), SessionState::Unauthenticated(None));
    }

    #[test]
    fn test_login_failure_keeps_message() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionEvent::BootWithoutSession).unwrap();
        machine.consume(&SessionEvent::LoginSubmitted).unwrap();
        assert_eq!(*machine.state(), SessionState::Authenticating);

        machine
            .consume(&SessionEvent::LoginFailed("Invalid credentials".to_string()))
            .unwrap();
        assert_eq!(machine.state().error(), Some("Invalid credentials"));

        machine.consume(&SessionEvent::ClearError).unwrap();
        assert_eq!(*machine.state(), SessionState::Unauthenticated(None));
    }

    #[test]
    fn test_relogin_from_authenticated() {
        let mut machine = authenticated_machine();

        machine.consume(&SessionEvent::LoginSubmitted).unwrap();
        assert_eq!(*machine.state(), SessionState::Authenticating);
    }

    #[test]
    fn test_refresh_replaces_tokens_only() {
        let mut machine = authenticated_machine();

        machine
            .consume(&SessionEvent::RefreshSucceeded(TokenPair::new("a2", "r2")))
            .unwrap();

        let current = machine.state().session().unwrap();
        assert_eq!(current.tokens, TokenPair::new("a2", "r2"));
        assert_eq!(current.profile, session("a1").profile);
    }

    #[test]
    fn test_refresh_failure_signs_out() {
        let mut machine = authenticated_machine();
        machine.consume(&SessionEvent::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SessionState::Unauthenticated(None));
    }

    #[test]
    fn test_refresh_during_boot_verification() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionEvent::BootWithStoredSession).unwrap();

        machine
            .consume(&SessionEvent::RefreshSucceeded(TokenPair::new("a2", "r2")))
            .unwrap();
        assert_eq!(*machine.state(), SessionState::Authenticating);

        machine.consume(&SessionEvent::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SessionState::Unauthenticated(None));
    }

    #[test]
    fn test_logout_flow() {
        let mut machine = authenticated_machine();
        machine.consume(&SessionEvent::LogoutRequested).unwrap();
        assert_eq!(*machine.state(), SessionState::Unauthenticated(None));
    }

    #[test]
    fn test_invalid_transition_returns_error() {
        let mut machine = SessionMachine::new();

        // Can't logout before boot has resolved
        assert!(machine.consume(&SessionEvent::LogoutRequested).is_err());
        // Can't claim a login result without submitting one
        assert!(machine
            .consume(&SessionEvent::LoginSucceeded(session("a1")))
            .is_err());
        assert_eq!(*machine.state(), SessionState::Booting);

        let mut machine = authenticated_machine();
        assert!(machine.consume(&SessionEvent::ClearError).is_err());
        assert!(machine.consume(&SessionEvent::BootWithoutSession).is_err());
        assert!(machine.state().is_authenticated());
    }

    #[test]
    fn test_every_event_from_transient_states_can_resolve() {
        // Each transient state has at least one event leading to a resolved phase.
        for state in [SessionState::Booting, SessionState::Authenticating] {
            let resolves = [
                SessionEvent::BootWithoutSession,
                SessionEvent::VerificationFailed,
                SessionEvent::LoginFailed("x".to_string()),
            ]
            .iter()
            .filter_map(|event| transition(&state, event))
            .any(|next| next.phase().is_resolved());
            assert!(resolves, "{:?} has no resolving event", state);
        }
    }

    #[test]
    fn test_phase_conversion() {
        assert_eq!(SessionPhase::from(&SessionState::Booting), SessionPhase::Booting);
        assert_eq!(
            SessionPhase::from(&SessionState::Authenticating),
            SessionPhase::Authenticating
        );
        assert_eq!(
            SessionPhase::from(&SessionState::Authenticated(session("a1"))),
            SessionPhase::Authenticated
        );
        assert_eq!(
            SessionPhase::from(&SessionState::Unauthenticated(Some("x".to_string()))),
            SessionPhase::Unauthenticated
        );
    }

    #[test]
    fn test_phase_is_resolved() {
        assert!(!SessionPhase::Booting.is_resolved());
        assert!(!SessionPhase::Authenticating.is_resolved());
        assert!(SessionPhase::Authenticated.is_resolved());
        assert!(SessionPhase::Unauthenticated.is_resolved());
    }

    #[test]
    fn test_payload_serialization() {
        let payload = SessionStateChangedPayload::from(&SessionState::Authenticated(session("a1")));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "state": "authenticated",
                "admin_id": "adm_1",
                "username": "admin"
            })
        );

        let payload = SessionStateChangedPayload::from(&SessionState::Unauthenticated(Some(
            "Invalid credentials".to_string(),
        )));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "state": "unauthenticated",
                "error": "Invalid credentials"
            })
        );
    }
}
