//! Coordination store client contract
//!
//! The networked client (transport, session renewal, retry and backoff) lives
//! outside this crate. The provider only needs existence checks, node creation
//! and a feed of session states.

use provider_api::{RegistryOption, SessionState};
use thiserror::Error;
use tokio::sync::broadcast;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Node durability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CreateMode {
    /// Survives the creating session
    Persistent,
    /// Removed when the creating session ends; may not have children
    Ephemeral,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Node does not exist: {0}")]
    NoNode(String),

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Ephemeral node cannot have children: {0}")]
    NoChildrenForEphemerals(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Connection to coordination store lost")]
    ConnectionLoss,

    #[error("Coordination store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_node_exists(&self) -> bool {
        matches!(self, StoreError::NodeExists(_))
    }
}

#[async_trait::async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Start a session; states are reported through [`CoordinationClient::subscribe_states`]
    async fn connect(&self, option: &RegistryOption) -> Result<()>;

    /// Whether a node exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Create a single node. The parent must already exist.
    async fn create(&self, path: &str, mode: CreateMode) -> Result<()>;

    /// Receive every session state the client observes from now on
    fn subscribe_states(&self) -> broadcast::Receiver<SessionState>;
}
