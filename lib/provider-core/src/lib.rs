//! Core provider functionality
//!
//! This library provides:
//! - Service descriptors and their method handlers
//! - The ordered service registry used for dispatch and registration
//! - Invocation contexts with exactly-once completion
//! - The coordination session state machine

pub mod context;
pub mod error;
pub mod registry;
pub mod service;
pub mod session;

pub use context::{InvocationContext, InvocationResult};
pub use error::{ProviderError, Result};
pub use registry::ServiceRegistry;
pub use service::{handler_fn, FnHandler, MethodHandler, ServiceDescriptor};
pub use session::{SessionEffect, SessionMachine};
