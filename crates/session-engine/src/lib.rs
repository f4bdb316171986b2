//! Client-side session engine for the partner console.
//!
//! This crate provides:
//! - An explicit FSM (`SessionStateMachine`) that owns the session state
//! - `AuthenticatedRequester`, which signs admin API calls and performs a
//!   single coalesced refresh-and-retry when the access token is rejected
//! - `SessionGate`, the route guard for protected paths
//! - `SessionManager`, the session service shared by the application
//! - `ConsoleRuntime`, which assembles all of the above from configuration

mod credentials;
mod error;
mod gate;
mod models;
mod requester;
mod runtime;
mod session;
mod session_fsm;
mod state;

pub use credentials::{CredentialSnapshot, SessionCredentials};
pub use error::{ApiError, ApiResult, RuntimeError, TransitionError};
pub use gate::{GateDecision, LoginRedirect, SessionGate};
pub use models::{
    endpoints, LoginResponse, MessageResponse, RefreshResponse, ResetTokenStatus, Session,
    TokenPair,
};
pub use requester::{ApiRequest, ApiResponse, AuthMode, AuthenticatedRequester};
pub use runtime::{ConsoleRuntime, SessionStatus};
pub use session::SessionManager;
pub use session_fsm::{
    transition, SessionEvent, SessionMachine, SessionMachineImpl, SessionPhase, SessionState,
    SessionStateChangedPayload,
};
pub use state::{SessionStateCallback, SessionStateMachine};

pub use reqwest::Method;
pub use token_store::{AdminProfile, AdminRole, TokenStore};

#[cfg(test)]
mod tests;
