//! Idempotent creation of hierarchical registration paths

use crate::client::{CoordinationClient, CreateMode, Result, StoreError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Collections created next to `providers` under every interface root
pub const SIBLING_COLLECTIONS: [&str; 3] = ["consumers", "configurators", "routers"];

/// Reject anything that is not an absolute, normalized node path
pub fn validate_path(path: &str) -> Result<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path[1..].split('/').any(str::is_empty) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parent of a node path; `None` for the root
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

pub fn join_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Every prefix of `path`, shortest first: `/a/b/c` -> `/a`, `/a/b`, `/a/b/c`
pub fn path_prefixes(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    (1..=segments.len())
        .map(|i| format!("/{}", segments[..i].join("/")))
        .collect()
}

/// PathEnsurer materializes a node and whatever ancestors it is missing.
///
/// Ancestors are always persistent, since the store refuses children under
/// ephemeral nodes; only the leaf takes the requested mode.
#[derive(Clone)]
pub struct PathEnsurer {
    client: Arc<dyn CoordinationClient>,
}

impl PathEnsurer {
    pub fn new(client: Arc<dyn CoordinationClient>) -> Self {
        Self { client }
    }

    /// Ensure `target` exists, creating missing ancestors root-to-leaf.
    ///
    /// When the parent is missing the interface root also receives the
    /// `consumers`, `configurators` and `routers` collections. Those are best
    /// effort: a failure there is logged and the leaf is still created.
    pub async fn ensure(&self, target: &str, leaf_mode: CreateMode) -> Result<()> {
        validate_path(target)?;

        if self.client.exists(target).await? {
            debug!(path = %target, "Node already present");
            return Ok(());
        }

        let parent = parent_path(target).ok_or_else(|| StoreError::InvalidPath(target.to_string()))?;
        if !self.client.exists(parent).await? {
            debug!(path = %parent, "Parent missing, creating ancestor chain");
            self.create_ancestors(parent).await?;
            self.create_sibling_collections(parent).await;
        }

        self.create_idempotent(target, leaf_mode).await?;
        debug!(path = %target, mode = ?leaf_mode, "Leaf node created");
        Ok(())
    }

    async fn create_ancestors(&self, parent: &str) -> Result<()> {
        for prefix in path_prefixes(parent) {
            self.create_idempotent(&prefix, CreateMode::Persistent).await?;
        }
        Ok(())
    }

    async fn create_sibling_collections(&self, parent: &str) {
        let Some(interface_root) = parent_path(parent) else {
            return;
        };
        for collection in SIBLING_COLLECTIONS {
            let path = join_path(interface_root, collection);
            if let Err(e) = self.create_idempotent(&path, CreateMode::Persistent).await {
                warn!(path = %path, error = %e, "Failed to create sibling collection");
            }
        }
    }

    /// Create a node, treating "already exists" as success
    async fn create_idempotent(&self, path: &str, mode: CreateMode) -> Result<()> {
        match self.client.create(path, mode).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_node_exists() => {
                debug!(path = %path, "Node already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
