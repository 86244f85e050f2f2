//! Coordination session connectivity states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connectivity state reported by the coordination store client
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// No live session; the initial state
    #[default]
    Disconnected,
    /// Session established with a read-write server
    Connected,
    /// Session established with a read-only server
    ReadOnly,
    /// Session rejected by the server's authentication
    AuthFailed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::ReadOnly => "read-only",
            SessionState::AuthFailed => "auth-failed",
        };
        f.write_str(s)
    }
}
