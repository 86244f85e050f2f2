//! Provider registration in the coordination store
//!
//! This library provides:
//! - The coordination client contract and an in-memory store
//! - Idempotent hierarchical path creation
//! - Provider URL and registration query construction
//! - The per-provider service registrar and its instance counter

pub mod client;
pub mod memory;
pub mod path;
pub mod registrar;
pub mod url;

pub use client::{CoordinationClient, CreateMode, StoreError};
pub use memory::{MemoryStore, StoreOp};
pub use path::PathEnsurer;
pub use registrar::{
    InterfaceInstanceCounter, Registration, RegistrationError, RegistrationPass, ServiceRegistrar,
};
pub use url::{ProviderUrl, RegistrationQuery};
