//! Per-request workspaces.
//!
//! Each deployment clones into its own directory under the configured root.
//! The directory is removed when the [`Workspace`] is released, and also
//! when it is dropped on an error or panic path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::task;
use tracing::{debug, warn};

use crate::config::WorkspaceConfig;
use crate::error::{DeployError, DeployResult};
use crate::types::ActivationId;

/// Allocates and releases workspaces.
#[derive(Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
    prefix: String,
    active: Arc<AtomicUsize>,
}

impl WorkspaceManager {
    /// Create a manager from configuration.
    #[must_use]
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self::with_root(&config.root, &config.prefix)
    }

    /// Create a manager allocating under `root`.
    pub fn with_root(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Directory under which workspaces are created.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of workspaces currently allocated.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Create a fresh, uniquely named workspace for one request.
    ///
    /// The name combines the activation ID with a random suffix, so
    /// concurrent allocations never collide.
    pub fn acquire(&self, activation_id: &ActivationId) -> DeployResult<Workspace> {
        std::fs::create_dir_all(&self.root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", self.prefix, activation_id))
            .tempdir_in(&self.root)
            .map_err(DeployError::Workspace)?;

        self.active.fetch_add(1, Ordering::Relaxed);
        debug!(path = %dir.path().display(), "workspace acquired");

        Ok(Workspace {
            dir: Some(dir),
            active: Arc::clone(&self.active),
        })
    }

    /// Remove a workspace and everything in it.
    ///
    /// Removal failures are logged, never returned: the deployment outcome
    /// does not depend on cleanup.
    pub async fn release(&self, mut workspace: Workspace) {
        let Some(dir) = workspace.dir.take() else {
            return;
        };
        let path = dir.path().to_owned();

        match task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!(path = %path.display(), "workspace released"),
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "failed to remove workspace");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "workspace cleanup task failed");
            }
        }
    }
}

/// An ephemeral directory owned by exactly one request.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    active: Arc<AtomicUsize>,
}

impl Workspace {
    /// Root of the workspace.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.as_ref().map_or_else(|| Path::new(""), TempDir::path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_owned();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "failed to remove dropped workspace");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, WorkspaceManager) {
        let root = tempfile::TempDir::new().unwrap();
        let manager = WorkspaceManager::with_root(root.path().join("ws"), "test-");
        (root, manager)
    }

    #[tokio::test]
    async fn acquire_and_release_removes_directory() {
        let (_root, manager) = manager();
        let workspace = manager.acquire(&ActivationId::generate()).unwrap();
        let path = workspace.path().to_owned();

        std::fs::create_dir_all(path.join("nested/deep")).unwrap();
        std::fs::write(path.join("nested/deep/file.txt"), "data").unwrap();
        assert_eq!(manager.active_count(), 1);

        manager.release(workspace).await;

        assert!(!path.exists());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn dropped_workspace_is_removed() {
        let (_root, manager) = manager();
        let path = {
            let workspace = manager.acquire(&ActivationId::generate()).unwrap();
            workspace.path().to_owned()
        };
        assert!(!path.exists());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn workspaces_are_unique_for_same_activation() {
        let (_root, manager) = manager();
        let id = ActivationId::generate();
        let a = manager.acquire(&id).unwrap();
        let b = manager.acquire(&id).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(manager.root()));
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn workspace_name_carries_prefix_and_activation() {
        let (_root, manager) = manager();
        let id = ActivationId::new("abc123");
        let workspace = manager.acquire(&id).unwrap();
        let name = workspace
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .to_owned();
        assert!(name.starts_with("test-abc123-"));
    }
}
