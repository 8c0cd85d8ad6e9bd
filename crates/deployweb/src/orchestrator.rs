//! The deployment pipeline.
//!
//! ```text
//! validate ──▶ workspace ──▶ fetch ──▶ locate ──▶ parse ──▶ overlay ──▶ execute
//!                  │                                                       │
//!                  └──────────────── released on every path ◀──────────────┘
//! ```
//!
//! Each stage returns a [`DeployResult`]; the first failure ends the run and
//! is mapped to the response by [`report`].

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::deploy::{self, DeploymentBackend, WhiskBackend};
use crate::error::{DeployError, DeployResult, DeployStage};
use crate::manifest::{self, ManifestDescriptor};
use crate::report::report;
use crate::source::{GitFetcher, RepositoryFetcher};
use crate::types::{
    ActivationId, DeploymentOutcome, DeploymentRequest, DeploymentResult, PlatformTarget,
};
use crate::workspace::{Workspace, WorkspaceManager};

/// Runs deployment requests end to end.
///
/// Requests share nothing but the workspace root; any number may run
/// concurrently.
pub struct Orchestrator {
    workspaces: WorkspaceManager,
    fetcher: Arc<dyn RepositoryFetcher>,
    backend: Arc<dyn DeploymentBackend>,
}

impl Orchestrator {
    /// Create an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        workspaces: WorkspaceManager,
        fetcher: Arc<dyn RepositoryFetcher>,
        backend: Arc<dyn DeploymentBackend>,
    ) -> Self {
        Self {
            workspaces,
            fetcher,
            backend,
        }
    }

    /// Create an orchestrator that clones with `git` and deploys to OpenWhisk.
    pub fn from_config(config: &ServiceConfig) -> DeployResult<Self> {
        Ok(Self::new(
            WorkspaceManager::new(&config.workspace),
            Arc::new(GitFetcher::new(&config.git)),
            Arc::new(WhiskBackend::new(&config.deploy)?),
        ))
    }

    /// Workspace allocator, for readiness reporting.
    #[must_use]
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run one request under a freshly generated activation id.
    pub async fn deploy(&self, request: DeploymentRequest) -> (StatusCode, DeploymentResult) {
        self.deploy_with_id(request, ActivationId::generate()).await
    }

    /// Run one request under the given activation id.
    #[instrument(skip_all, fields(activation_id = %activation_id))]
    pub async fn deploy_with_id(
        &self,
        request: DeploymentRequest,
        activation_id: ActivationId,
    ) -> (StatusCode, DeploymentResult) {
        let outcome = self.run(&request, &activation_id).await;
        match &outcome {
            Ok(outcomes) => info!(entities = outcomes.len(), "deployment succeeded"),
            Err(e) => warn!(stage = %e.stage(), error = %e, "deployment aborted"),
        }
        report(outcome, activation_id)
    }

    async fn run(
        &self,
        request: &DeploymentRequest,
        activation_id: &ActivationId,
    ) -> DeployResult<Vec<DeploymentOutcome>> {
        let repository_url = request
            .repository_url()
            .ok_or(DeployError::MissingRepositoryUrl)?;
        let manifest_path = request
            .manifest_path()
            .ok_or_else(|| DeployError::ManifestPathNotFound {
                path: String::new(),
                reason: "manifestPath is required".to_owned(),
            })?;
        let target = request.target().ok_or(DeployError::MissingDeploymentTarget(
            "wskApiHost and wskAuth are required",
        ))?;

        let workspace = self.workspaces.acquire(activation_id)?;
        let result = self
            .run_in_workspace(
                &workspace,
                repository_url,
                manifest_path,
                request,
                &target,
                activation_id,
            )
            .await;
        self.workspaces.release(workspace).await;
        result
    }

    async fn run_in_workspace(
        &self,
        workspace: &Workspace,
        repository_url: &str,
        manifest_path: &str,
        request: &DeploymentRequest,
        target: &PlatformTarget,
        activation_id: &ActivationId,
    ) -> DeployResult<Vec<DeploymentOutcome>> {
        info!(stage = %DeployStage::Fetch, "fetching repository");
        self.fetcher.fetch(repository_url, workspace.path()).await?;

        let descriptor =
            load_manifest(workspace.path().to_owned(), manifest_path.to_owned()).await?;
        info!(
            stage = %DeployStage::Parse,
            packages = descriptor.packages.len(),
            actions = descriptor.action_count(),
            overrides = request.environment_overrides.len(),
            "manifest loaded"
        );

        let descriptor = manifest::apply_overrides(&descriptor, &request.environment_overrides);

        info!(stage = %DeployStage::Execute, api_host = %target.api_host, "deploying entities");
        deploy::execute(&descriptor, target, self.backend.as_ref(), activation_id).await
    }
}

/// Locate and parse the manifest off the async runtime.
async fn load_manifest(root: PathBuf, manifest_path: String) -> DeployResult<ManifestDescriptor> {
    tokio::task::spawn_blocking(move || {
        let file = manifest::locate_manifest(&root, &manifest_path)?;
        manifest::parse_manifest(&file)
    })
    .await
    .map_err(|e| DeployError::Internal(format!("manifest task failed: {e}")))?
}
