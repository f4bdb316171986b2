//! Shared holder of the session machine.
//!
//! Transitions are applied and published to watchers under one lock, so
//! observers see states in the order they were entered. The state callback
//! runs after the lock is released.

use crate::error::TransitionError;
use crate::session_fsm::{
    SessionEvent, SessionMachine, SessionPhase, SessionState, SessionStateChangedPayload,
};
use parking_lot::Mutex;
use token_store::AdminProfile;
use tokio::sync::watch;
use tracing::debug;

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionStateChangedPayload) + Send + Sync>;

/// Authoritative in-memory session state.
pub struct SessionStateMachine {
    machine: Mutex<SessionMachine>,
    sender: watch::Sender<SessionState>,
    /// Optional callback for phase change notifications.
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a machine in `Booting`.
    pub fn new() -> Self {
        let machine = SessionMachine::new();
        let (sender, _) = watch::channel(machine.state().clone());
        Self {
            machine: Mutex::new(machine),
            sender,
            state_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of phase changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.machine.lock().state().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.lock().state().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.machine.lock().state().is_authenticated()
    }

    /// Profile of the signed-in admin.
    pub fn profile(&self) -> Option<AdminProfile> {
        self.machine
            .lock()
            .state()
            .session()
            .map(|session| session.profile.clone())
    }

    /// Receiver that observes every state the machine enters.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }

    /// Apply an event. Illegal events leave the state untouched.
    pub fn dispatch(&self, event: &SessionEvent) -> Result<SessionState, TransitionError> {
        let (old_phase, new_state) = {
            let mut machine = self.machine.lock();
            let old_phase = machine.state().phase();

            machine.consume(event).map_err(|_| TransitionError {
                from: old_phase,
                event: event.name(),
            })?;

            let new_state = machine.state().clone();
            self.sender.send_replace(new_state.clone());
            (old_phase, new_state)
        };

        let new_phase = new_state.phase();
        if old_phase != new_phase {
            debug!(
                old_state = %old_phase,
                new_state = %new_phase,
                event = event.name(),
                "Session state transition"
            );
            self.notify_state_change(&new_state);
        }

        Ok(new_state)
    }

    /// Notify the callback of a state change.
    fn notify_state_change(&self, state: &SessionState) {
        let callback = self.state_callback.lock();
        if let Some(callback) = callback.as_ref() {
            callback(SessionStateChangedPayload::from(state));
        }
    }
}
