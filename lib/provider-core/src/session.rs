//! Coordination session state machine
//!
//! The machine never retries or reconnects on its own: retry and backoff
//! belong to the coordination client. It only maps each reported state to the
//! effects the provider must perform.

use provider_api::SessionState;
use tracing::debug;

/// Work the provider must carry out after a state report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEffect {
    /// Register every currently held service
    RegisterServices,
    /// Notify the host of a session problem
    RaiseError {
        state: SessionState,
        /// Attach the active configuration so the host can rebuild the connection
        with_option: bool,
    },
}

/// Compute the next state and its effects for a reported session state.
///
/// Every report produces its effect, including repeats of the current state:
/// registration is idempotent and hosts expect one notification per report.
pub fn transition(current: SessionState, reported: SessionState) -> (SessionState, Vec<SessionEffect>) {
    let effects = match reported {
        SessionState::Connected => vec![SessionEffect::RegisterServices],
        SessionState::ReadOnly => vec![SessionEffect::RaiseError {
            state: reported,
            with_option: false,
        }],
        SessionState::Disconnected | SessionState::AuthFailed => vec![SessionEffect::RaiseError {
            state: reported,
            with_option: true,
        }],
    };
    debug!("Session state {} -> {}", current, reported);
    (reported, effects)
}

/// One per provider; lives for the lifetime of the process
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply a reported state and return the effects to perform
    pub fn on_state(&mut self, reported: SessionState) -> Vec<SessionEffect> {
        let (next, effects) = transition(self.state, reported);
        self.state = next;
        effects
    }
}
