//! Events exchanged with the transport and the host application

use provider_api::{ProviderOption, SessionState};
use provider_core::InvocationContext;
use std::sync::Arc;

/// Signals emitted by the network listener
#[derive(Debug)]
pub enum TransportEvent {
    /// The listener is accepting connections; connect to the coordination store
    Ready,
    /// A parsed inbound call
    Invoke(InvocationContext),
}

/// Notifications raised to the host application
#[derive(Clone, Debug)]
pub enum ProviderEvent {
    /// The coordination session entered a problematic state. Disconnect and
    /// authentication failures carry the active configuration so the host can
    /// rebuild the connection.
    SessionError {
        state: SessionState,
        option: Option<Arc<ProviderOption>>,
    },
}
