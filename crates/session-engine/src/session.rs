//! Session service.
//!
//! `SessionManager` is constructed once and shared by everything that needs
//! the session. It exposes read access to the state and a narrow set of
//! commands (restore, login, logout, clear error, password flows); the state
//! machine it drives stays the only authority on which transitions happen.

use crate::credentials::SessionCredentials;
use crate::error::{ApiResult, TransitionError};
use crate::models::{
    endpoints, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    PasswordChangeRequest, ResetPasswordRequest, ResetTokenStatus, Session, TokenPair,
};
use crate::requester::{ApiRequest, ApiResponse, AuthenticatedRequester};
use crate::session_fsm::{SessionEvent, SessionPhase, SessionState};
use crate::state::{SessionStateCallback, SessionStateMachine};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use token_store::{AdminProfile, TokenStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Session service shared by the application.
#[derive(Clone)]
pub struct SessionManager {
    credentials: Arc<SessionCredentials>,
    machine: Arc<SessionStateMachine>,
    requester: Arc<AuthenticatedRequester>,
}

impl SessionManager {
    /// Create a session manager with its own HTTP client.
    pub fn new(store: Arc<TokenStore>, base_url: Url, timeout: Duration) -> ApiResult<Self> {
        let credentials = Arc::new(SessionCredentials::new(store));
        let machine = Arc::new(SessionStateMachine::new());
        let requester = AuthenticatedRequester::new(
            base_url,
            timeout,
            credentials.clone(),
            machine.clone(),
        )?;
        Ok(Self::from_parts(credentials, machine, requester))
    }

    /// Create a session manager over an existing HTTP client.
    pub fn with_client(store: Arc<TokenStore>, client: Client, base_url: Url) -> Self {
        let credentials = Arc::new(SessionCredentials::new(store));
        let machine = Arc::new(SessionStateMachine::new());
        let requester = AuthenticatedRequester::with_client(
            client,
            base_url,
            credentials.clone(),
            machine.clone(),
        );
        Self::from_parts(credentials, machine, requester)
    }

    fn from_parts(
        credentials: Arc<SessionCredentials>,
        machine: Arc<SessionStateMachine>,
        requester: AuthenticatedRequester,
    ) -> Self {
        Self {
            credentials,
            machine,
            requester: Arc::new(requester),
        }
    }

    // ==========================================
    // Read access
    // ==========================================

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.machine.is_authenticated()
    }

    /// Profile of the signed-in admin.
    pub fn profile(&self) -> Option<AdminProfile> {
        self.machine.profile()
    }

    /// Receiver that observes every session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.machine.subscribe()
    }

    /// Set a callback to be notified of session phase changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        self.machine.set_state_callback(callback);
    }

    pub fn machine(&self) -> Arc<SessionStateMachine> {
        self.machine.clone()
    }

    pub fn store(&self) -> Arc<TokenStore> {
        self.credentials.store().clone()
    }

    /// Send an API request on behalf of the session.
    pub async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        self.requester.send(request).await
    }

    // ==========================================
    // Commands
    // ==========================================

    /// Resolve the boot state from the stored session.
    ///
    /// A stored session is re-verified against `auth/me`; on success the
    /// cached profile is replaced by the fetched one, on any failure the
    /// session is cleared. Always ends in a resolved state. Only acts while
    /// booting; later calls return the current state.
    pub async fn restore(&self) -> SessionState {
        if self.machine.phase() != SessionPhase::Booting {
            return self.state();
        }

        let Some(stored) = self.credentials.load_from_store() else {
            info!("No existing session found on startup");
            self.apply(SessionEvent::BootWithoutSession);
            return self.state();
        };

        info!(username = %stored.profile.username, "Stored session found, verifying with server");
        self.apply(SessionEvent::BootWithStoredSession);

        let request = ApiRequest::get(endpoints::ME);
        match self.requester.send_json::<AdminProfile>(&request).await {
            Ok(profile) => {
                let current = self.credentials.snapshot();
                match current.tokens {
                    Some(tokens) if !current.scope.is_cancelled() => {
                        self.credentials.update_profile(&profile);
                        info!(
                            username = %profile.username,
                            "Session restored (verified with server)"
                        );
                        self.apply(SessionEvent::VerificationSucceeded(Session::new(
                            tokens, profile,
                        )));
                    }
                    _ => {
                        warn!("Session ended while it was being verified");
                        self.apply(SessionEvent::VerificationFailed);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Session verification failed, clearing session");
                self.credentials.teardown();
                self.apply(SessionEvent::VerificationFailed);
            }
        }

        self.state()
    }

    /// Log in with username and password.
    ///
    /// Failures do not surface as errors: they leave the machine in
    /// `Unauthenticated(detail)`. Logging in over an active session replaces
    /// it. Returns an error only when a login cannot be submitted in the
    /// current phase (booting, or another login in flight).
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionState, TransitionError> {
        let was_authenticated = self.machine.is_authenticated();
        self.machine.dispatch(&SessionEvent::LoginSubmitted)?;
        if was_authenticated {
            debug!("Replacing active session");
            self.credentials.teardown();
        }

        debug!(username = %username, "Attempting login");
        let result = match ApiRequest::post(endpoints::LOGIN)
            .anonymous()
            .json(&LoginRequest { username, password })
        {
            Ok(request) => self.requester.send_json::<LoginResponse>(&request).await,
            Err(e) => Err(e),
        };

        let event = match result {
            Ok(response) => {
                let profile = response.admin.clone();
                let session = Session::new(TokenPair::from(response), profile);
                self.credentials.install(&session);
                info!(
                    username = %session.profile.username,
                    role = %session.profile.role,
                    "Login successful"
                );
                SessionEvent::LoginSucceeded(session)
            }
            Err(e) => {
                warn!(username = %username, error = %e, "Login failed");
                SessionEvent::LoginFailed(e.detail())
            }
        };

        self.apply(event);
        Ok(self.state())
    }

    /// Log out.
    ///
    /// The server is told first, best-effort; local teardown happens whatever
    /// the outcome, so logout always ends signed out with an empty store.
    pub async fn logout(&self) -> SessionState {
        if self.credentials.snapshot().tokens.is_some() {
            let request = ApiRequest::post(endpoints::LOGOUT).bearer_only();
            match self.requester.send(&request).await {
                Ok(_) => debug!("Server session invalidated"),
                Err(e) => warn!(error = %e, "Server logout failed, clearing local session anyway"),
            }
        }

        self.credentials.teardown();
        self.apply(SessionEvent::LogoutRequested);
        info!("Logged out");
        self.state()
    }

    /// Drop the last login error.
    pub fn clear_error(&self) -> SessionState {
        self.apply(SessionEvent::ClearError);
        self.state()
    }

    /// Change the signed-in admin's password.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> ApiResult<MessageResponse> {
        let request = ApiRequest::put(endpoints::PASSWORD).json(&PasswordChangeRequest {
            current_password,
            new_password,
        })?;
        self.requester.send_json(&request).await
    }

    /// Ask the server to email a password reset link.
    pub async fn request_password_reset(&self, email: &str) -> ApiResult<MessageResponse> {
        let request = ApiRequest::post(endpoints::FORGOT_PASSWORD)
            .anonymous()
            .json(&ForgotPasswordRequest { email })?;
        self.requester.send_json(&request).await
    }

    /// Check whether a password reset token is still usable.
    pub async fn verify_reset_token(&self, token: &str) -> ApiResult<ResetTokenStatus> {
        let path = format!("{}/{}", endpoints::VERIFY_RESET_TOKEN, encode_path_segment(token));
        let request = ApiRequest::get(path).anonymous();
        self.requester.send_json(&request).await
    }

    /// Set a new password using a reset token.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> ApiResult<MessageResponse> {
        let request = ApiRequest::post(endpoints::RESET_PASSWORD)
            .anonymous()
            .json(&ResetPasswordRequest {
                token,
                new_password,
            })?;
        self.requester.send_json(&request).await
    }

    /// Apply an event the current phase may not accept; a rejected event
    /// leaves the state as it is.
    fn apply(&self, event: SessionEvent) {
        if let Err(e) = self.machine.dispatch(&event) {
            debug!(error = %e, "Session event ignored");
        }
    }
}

fn encode_path_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
