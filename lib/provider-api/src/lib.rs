//! Provider API types shared across the workspace
//!
//! This library defines:
//! - ProviderOption: the validated, immutable provider configuration
//! - ProviderOverrides: caller-supplied configuration merged over defaults
//! - SessionState: connectivity states reported by the coordination store

pub mod option;
pub mod state;

pub use option::{
    ApplicationOption, ApplicationOverrides, ConfigError, ProviderOption, ProviderOverrides,
    RegistryOption, RegistryOverrides,
};
pub use state::SessionState;
