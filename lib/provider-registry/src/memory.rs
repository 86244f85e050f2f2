//! In-process coordination store
//!
//! Enforces the same node rules as a ZooKeeper ensemble: the parent must
//! exist, ephemeral nodes cannot have children, and creating an existing node
//! fails. Every call is recorded so callers can inspect the exact sequence.

use crate::client::{CoordinationClient, CreateMode, Result, StoreError};
use crate::path::{parent_path, validate_path};
use provider_api::{RegistryOption, SessionState};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

const STATE_CHANNEL_CAPACITY: usize = 64;

/// A recorded client call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Connect(String),
    Exists(String),
    Create(String, CreateMode),
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, CreateMode>,
    operations: Vec<StoreOp>,
    failures: HashMap<String, StoreError>,
    state: SessionState,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    states: broadcast::Sender<SessionState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (states, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            states,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))
    }

    /// Report a session state to subscribers
    pub fn set_state(&self, state: SessionState) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = state;
        }
        // no subscribers is fine
        let _ = self.states.send(state);
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().map(|i| i.state).unwrap_or_default()
    }

    /// End the session: drop every ephemeral node and report `Disconnected`
    pub fn expire_session(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.nodes.retain(|_, mode| *mode == CreateMode::Persistent);
        }
        self.set_state(SessionState::Disconnected);
    }

    /// Make every create of `path` fail with `error` until cleared
    pub fn fail_on(&self, path: impl Into<String>, error: StoreError) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures.insert(path.into(), error);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures.clear();
        }
    }

    /// Insert a node directly, bypassing the parent checks
    pub fn seed(&self, path: impl Into<String>, mode: CreateMode) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.nodes.insert(path.into(), mode);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        path == "/" || self.inner.lock().map(|i| i.nodes.contains_key(path)).unwrap_or(false)
    }

    pub fn mode(&self, path: &str) -> Option<CreateMode> {
        self.inner.lock().ok().and_then(|i| i.nodes.get(path).copied())
    }

    /// Direct children names of `path`, sorted
    pub fn children(&self, path: &str) -> Vec<String> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner
            .nodes
            .keys()
            .filter(|p| parent_path(p) == Some(path))
            .filter_map(|p| p.rsplit('/').next().map(str::to_string))
            .collect()
    }

    /// All nodes, sorted by path
    pub fn nodes(&self) -> Vec<(String, CreateMode)> {
        self.inner
            .lock()
            .map(|i| i.nodes.iter().map(|(p, m)| (p.clone(), *m)).collect())
            .unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.inner.lock().map(|i| i.operations.clone()).unwrap_or_default()
    }

    /// Paths passed to `create`, in call order
    pub fn created_paths(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Create(path, _) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn clear_operations(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.operations.clear();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CoordinationClient for MemoryStore {
    async fn connect(&self, option: &RegistryOption) -> Result<()> {
        {
            let mut inner = self.lock()?;
            inner.operations.push(StoreOp::Connect(option.address.clone()));
        }
        debug!("Memory store session opened for {}", option.address);
        self.set_state(SessionState::Connected);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        let mut inner = self.lock()?;
        inner.operations.push(StoreOp::Exists(path.to_string()));
        Ok(path == "/" || inner.nodes.contains_key(path))
    }

    async fn create(&self, path: &str, mode: CreateMode) -> Result<()> {
        validate_path(path)?;
        let mut inner = self.lock()?;
        inner.operations.push(StoreOp::Create(path.to_string(), mode));

        if let Some(error) = inner.failures.get(path) {
            return Err(error.clone());
        }
        if path == "/" || inner.nodes.contains_key(path) {
            return Err(StoreError::NodeExists(path.to_string()));
        }

        let parent = parent_path(path).ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        if parent != "/" {
            match inner.nodes.get(parent) {
                None => return Err(StoreError::NoNode(parent.to_string())),
                Some(CreateMode::Ephemeral) => {
                    return Err(StoreError::NoChildrenForEphemerals(parent.to_string()))
                }
                Some(CreateMode::Persistent) => {}
            }
        }

        inner.nodes.insert(path.to_string(), mode);
        Ok(())
    }

    fn subscribe_states(&self) -> broadcast::Receiver<SessionState> {
        self.states.subscribe()
    }
}
