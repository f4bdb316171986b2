//! Application-level session runtime.
//!
//! Builds the session service from configuration once at start-up so every
//! command shares one authority for login, logout, status and gating.

use crate::error::RuntimeError;
use crate::gate::SessionGate;
use crate::session::SessionManager;
use crate::session_fsm::{SessionPhase, SessionState};
use console_config::{Config, Paths};
use serde::Serialize;
use std::sync::Arc;
use token_store::{AdminRole, TokenStore};
use tracing::debug;

/// Snapshot of the session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionPhase,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub api_base_url: String,
}

/// Shared console runtime.
#[derive(Clone)]
pub struct ConsoleRuntime {
    config: Config,
    paths: Paths,
    manager: SessionManager,
    gate: Arc<SessionGate>,
}

impl ConsoleRuntime {
    /// Create a runtime whose session persists under `paths`.
    pub fn new(config: Config, paths: Paths) -> Result<Self, RuntimeError> {
        let store = token_store::create_token_store(&paths);
        Self::with_store(config, paths, store)
    }

    /// Create a runtime over an explicit token store.
    pub fn with_store(
        config: Config,
        paths: Paths,
        store: TokenStore,
    ) -> Result<Self, RuntimeError> {
        let base_url = config.api_base_url()?;
        debug!(
            api_base_url = %base_url,
            timeout_secs = config.request_timeout().as_secs(),
            "Creating session runtime"
        );

        let manager = SessionManager::new(Arc::new(store), base_url, config.request_timeout())?;
        let gate = Arc::new(SessionGate::from_config(manager.machine(), &config));

        Ok(Self {
            config,
            paths,
            manager,
            gate,
        })
    }

    /// Resolve the stored session. Always ends authenticated or unauthenticated.
    pub async fn boot(&self) -> SessionState {
        self.manager.restore().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn gate(&self) -> Arc<SessionGate> {
        self.gate.clone()
    }

    /// Current session status snapshot.
    pub fn status(&self) -> SessionStatus {
        let state = self.manager.state();
        let profile = state.session().map(|session| &session.profile);

        SessionStatus {
            state: state.phase(),
            authenticated: state.is_authenticated(),
            username: profile.map(|p| p.username.clone()),
            email: profile.map(|p| p.email.clone()),
            display_name: profile.map(|p| p.display_name.clone()),
            role: profile.map(|p| p.role),
            error: state.error().map(str::to_string),
            api_base_url: self.config.api_base_url.clone(),
        }
    }
}
