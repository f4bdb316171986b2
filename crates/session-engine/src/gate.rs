//! Route-level session gate.
//!
//! The gate never lets a protected path through before the session machine
//! has resolved. While it is booting or authenticating the answer is
//! `Loading`; once resolved it is either `Render` or a redirect to the login
//! route that remembers where the user was going.

use crate::session_fsm::SessionPhase;
use crate::state::SessionStateMachine;
use console_config::Config;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Redirect to the login route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRedirect {
    /// Login route.
    pub to: String,
    /// Originally requested location, restored after login.
    pub from: String,
}

/// What to do with a request for a protected path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Session unresolved: show a neutral placeholder, do not navigate.
    Loading,
    /// Signed in: render the protected content.
    Render,
    /// Signed out: go to login.
    Redirect(LoginRedirect),
}

/// Guard for protected routes.
pub struct SessionGate {
    machine: Arc<SessionStateMachine>,
    login_path: String,
    landing_path: String,
}

impl SessionGate {
    pub fn new(
        machine: Arc<SessionStateMachine>,
        login_path: impl Into<String>,
        landing_path: impl Into<String>,
    ) -> Self {
        Self {
            machine,
            login_path: login_path.into(),
            landing_path: landing_path.into(),
        }
    }

    /// Gate using the configured login and landing routes.
    pub fn from_config(machine: Arc<SessionStateMachine>, config: &Config) -> Self {
        Self::new(machine, config.login_path.clone(), config.landing_path.clone())
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    /// Decision for `requested` in `phase`.
    pub fn decide(&self, phase: SessionPhase, requested: &str) -> GateDecision {
        match phase {
            SessionPhase::Booting | SessionPhase::Authenticating => GateDecision::Loading,
            SessionPhase::Authenticated => GateDecision::Render,
            SessionPhase::Unauthenticated => GateDecision::Redirect(LoginRedirect {
                to: self.login_path.clone(),
                from: requested.to_string(),
            }),
        }
    }

    /// Decision for `requested` right now, without waiting.
    pub fn check(&self, requested: &str) -> GateDecision {
        self.decide(self.machine.phase(), requested)
    }

    /// Wait until the session resolves, then decide for `requested`.
    pub async fn resolve(&self, requested: &str) -> GateDecision {
        let mut receiver = self.machine.subscribe();
        let phase = match receiver.wait_for(|state| state.phase().is_resolved()).await {
            Ok(state) => state.phase(),
            Err(_) => self.machine.phase(),
        };

        let decision = self.decide(phase, requested);
        debug!(path = %requested, phase = %phase, decision = ?decision, "Gate resolved");
        decision
    }

    /// Where to go after a successful login.
    ///
    /// `from` is honoured only when it is a local absolute path (a single
    /// leading `/`) outside the login route; anything else lands on the
    /// landing route.
    pub fn destination_after_login(&self, from: Option<&str>) -> String {
        match from {
            Some(from) if self.is_safe_destination(from) => from.to_string(),
            _ => self.landing_path.clone(),
        }
    }

    fn is_safe_destination(&self, from: &str) -> bool {
        let mut chars = from.chars();
        if chars.next() != Some('/') || matches!(chars.next(), Some('/') | Some('\\')) {
            return false;
        }

        let path = from.split(['?', '#']).next().unwrap_or(from);
        let login = self.login_path.trim_end_matches('/');
        let path = path.trim_end_matches('/');
        path != login
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Session, TokenPair};
    use crate::session_fsm::SessionEvent;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use token_store::{AdminProfile, AdminRole};

    fn gate() -> (Arc<SessionStateMachine>, SessionGate) {
        let machine = Arc::new(SessionStateMachine::new());
        let gate = SessionGate::new(machine.clone(), "/admin/login", "/admin");
        (machine, gate)
    }

    fn session() -> Session {
        Session::new(
            TokenPair::new("a", "r"),
            AdminProfile {
                admin_id: "adm_1".to_string(),
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                role: AdminRole::SuperAdmin,
                display_name: "Admin".to_string(),
                permissions: BTreeMap::new(),
            },
        )
    }

    #[test]
    fn test_unresolved_session_is_loading() {
        let (_, gate) = gate();
        assert_eq!(gate.check("/admin/solutions"), GateDecision::Loading);
        assert_eq!(
            gate.decide(SessionPhase::Authenticating, "/admin/solutions"),
            GateDecision::Loading
        );
    }

    #[test]
    fn test_unauthenticated_redirect_keeps_destination() {
        let (machine, gate) = gate();
        machine.dispatch(&SessionEvent::BootWithoutSession).unwrap();

        assert_eq!(
            gate.check("/admin/solutions"),
            GateDecision::Redirect(LoginRedirect {
                to: "/admin/login".to_string(),
                from: "/admin/solutions".to_string(),
            })
        );
    }

    #[test]
    fn test_authenticated_renders() {
        let (machine, gate) = gate();
        machine.dispatch(&SessionEvent::BootWithStoredSession).unwrap();
        machine
            .dispatch(&SessionEvent::VerificationSucceeded(session()))
            .unwrap();

        assert_eq!(gate.check("/admin/solutions"), GateDecision::Render);
    }

    #[test]
    fn test_destination_after_login() {
        let (_, gate) = gate();

        assert_eq!(
            gate.destination_after_login(Some("/admin/solutions")),
            "/admin/solutions"
        );
        assert_eq!(
            gate.destination_after_login(Some("/admin/logs?level=error")),
            "/admin/logs?level=error"
        );
        assert_eq!(gate.destination_after_login(None), "/admin");
        assert_eq!(gate.destination_after_login(Some("/admin/login")), "/admin");
        assert_eq!(
            gate.destination_after_login(Some("/admin/login?next=/x")),
            "/admin"
        );
        assert_eq!(
            gate.destination_after_login(Some("//evil.example.com")),
            "/admin"
        );
        assert_eq!(
            gate.destination_after_login(Some("https://evil.example.com/admin")),
            "/admin"
        );
        assert_eq!(gate.destination_after_login(Some("")), "/admin");
    }

    #[test]
    fn test_decision_serialization() {
        let decision = GateDecision::Redirect(LoginRedirect {
            to: "/admin/login".to_string(),
            from: "/admin/solutions".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&decision).unwrap(),
            serde_json::json!({
                "decision": "redirect",
                "to": "/admin/login",
                "from": "/admin/solutions"
            })
        );
    }

    #[tokio::test]
    async fn test_resolve_waits_for_terminal_state() {
        let (machine, gate) = gate();
        machine.dispatch(&SessionEvent::BootWithStoredSession).unwrap();

        let gate = Arc::new(gate);
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.resolve("/admin/solutions").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        machine.dispatch(&SessionEvent::VerificationFailed).unwrap();
        let decision = waiter.await.unwrap();
        assert!(matches!(decision, GateDecision::Redirect(_)));
    }
}
