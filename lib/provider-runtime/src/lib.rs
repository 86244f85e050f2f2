//! Provider composition root
//!
//! Wires transport events to the dispatcher and coordination session states
//! to the registrar.

pub mod event;
pub mod provider;

pub use event::{ProviderEvent, TransportEvent};
pub use provider::{Provider, RuntimeError};
