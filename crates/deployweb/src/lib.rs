//! Deployment service for OpenWhisk manifests.
//!
//! A request names a git repository, a directory inside it holding a
//! manifest, optional parameter overrides and the target platform. The
//! service clones the repository into a private workspace, parses the
//! manifest, applies the overrides and creates every package and action on
//! the platform:
//!
//! ```text
//! POST /deploy ──▶ Orchestrator
//!                    ├─ WorkspaceManager   per-request temp directory
//!                    ├─ RepositoryFetcher  git clone
//!                    ├─ manifest           locate ▸ parse ▸ overlay
//!                    ├─ deploy::execute    DeploymentBackend per entity
//!                    └─ report             DeploymentResult + activation id
//! ```
//!
//! # Example
//!
//! ```ignore
//! use deployweb::{DeploymentRequest, Orchestrator, ServiceConfig};
//!
//! let orchestrator = Orchestrator::from_config(&ServiceConfig::default())?;
//! let request = DeploymentRequest::new("https://github.com/org/repo", "deploy/hello")
//!     .with_target("openwhisk.example.com", "uuid:key");
//!
//! let (status, result) = orchestrator.deploy(request).await;
//! println!("{status}: {}", result.activation_id);
//! ```

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod deploy;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod report;
pub mod source;
pub mod types;
pub mod workspace;

// Re-export commonly used types at the crate root
pub use config::ServiceConfig;
pub use deploy::{DeploymentBackend, MockBackend, WhiskBackend};
pub use error::{DeployError, DeployResult, DeployStage};
pub use manifest::ManifestDescriptor;
pub use orchestrator::Orchestrator;
pub use source::{GitFetcher, RepositoryFetcher};
pub use types::{
    ActivationId, DeploymentOutcome, DeploymentRequest, DeploymentResult, EntityKind,
    Parameters, PlatformTarget, ResultStatus,
};
pub use workspace::{Workspace, WorkspaceManager};
