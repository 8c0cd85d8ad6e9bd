//! Common test utilities for deployweb integration tests.

#![allow(dead_code)]

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use deployweb::api::AppState;
use deployweb::{
    DeployError, DeployResult, MockBackend, Orchestrator, RepositoryFetcher, WorkspaceManager,
};
use tempfile::TempDir;

/// Repository URL served by [`LocalFetcher`].
pub const HELLO_REPO_URL: &str = "https://github.com/apache/openwhisk-test-hello";

/// URL [`LocalFetcher`] reports as nonexistent.
pub const MISSING_REPO_URL: &str = "https://github.com/apache/does-not-exist-anywhere";

/// Fetcher that copies a local fixture tree instead of cloning.
pub struct LocalFetcher {
    url: String,
    source: PathBuf,
    fetches: AtomicUsize,
}

impl LocalFetcher {
    /// Serve `source` for `url`; every other url fails like a missing repository.
    pub fn new(url: &str, source: &Path) -> Self {
        Self {
            url: url.to_owned(),
            source: source.to_owned(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetch attempts so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryFetcher for LocalFetcher {
    async fn fetch(&self, url: &str, into: &Path) -> DeployResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if url != self.url {
            return Err(DeployError::RepositoryUnavailable {
                url: url.to_owned(),
                message: "remote: Repository not found.".to_owned(),
            });
        }
        fixtures::copy_tree(&self.source, into)?;
        Ok(())
    }
}

/// Complete service setup with local collaborators wired together.
pub struct TestService {
    /// Fixture repository contents.
    pub repo: TempDir,
    /// Directory under which workspaces are allocated.
    pub workspace_root: TempDir,
    pub fetcher: Arc<LocalFetcher>,
    pub backend: Arc<MockBackend>,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestService {
    /// Service whose backend accepts every entity.
    pub fn new() -> Self {
        Self::with_backend(MockBackend::default())
    }

    /// Service with a specific backend.
    pub fn with_backend(backend: MockBackend) -> Self {
        let repo = fixtures::hello_repository();
        let workspace_root = TempDir::new().unwrap();
        let fetcher = Arc::new(LocalFetcher::new(HELLO_REPO_URL, repo.path()));
        let backend = Arc::new(backend);

        let orchestrator = Arc::new(Orchestrator::new(
            WorkspaceManager::with_root(workspace_root.path(), "it-"),
            fetcher.clone(),
            backend.clone(),
        ));

        Self {
            repo,
            workspace_root,
            fetcher,
            backend,
            orchestrator,
        }
    }

    /// Router state for HTTP tests.
    pub fn app_state(&self) -> AppState {
        AppState {
            orchestrator: self.orchestrator.clone(),
        }
    }

    /// Number of workspace directories left on disk.
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.workspace_root.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl Default for TestService {
    fn default() -> Self {
        Self::new()
    }
}
