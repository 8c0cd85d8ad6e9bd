//! Error types for the deployment pipeline.

use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DeploymentOutcome;

/// Message returned when the request carries no repository URL.
pub const MISSING_REPOSITORY_URL_MESSAGE: &str = "Please enter the GitHub repo url in params";

/// Message returned when the repository could not be cloned.
pub const REPOSITORY_UNAVAILABLE_MESSAGE: &str =
    "There was a problem cloning from github. Does that github repo exist? Does it begin with http?";

/// Message returned when no manifest file could be found at the given path.
pub const MANIFEST_NOT_FOUND_MESSAGE: &str =
    "Error loading manifest file. Does a manifest file exist?";

/// Message returned when the target platform host or credential is missing.
pub const MISSING_DEPLOYMENT_TARGET_MESSAGE: &str = "Please provide wskApiHost and wskAuth in params";

/// Message returned when the request body is not a JSON object.
pub const MALFORMED_REQUEST_MESSAGE: &str = "Request body must be a JSON object";

/// Pipeline stage for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    /// Request validation, before any side effects.
    Validate,
    /// Workspace allocation.
    Workspace,
    /// Repository clone.
    Fetch,
    /// Manifest lookup inside the cloned tree.
    Locate,
    /// Manifest parsing.
    Parse,
    /// Entity deployment against the target platform.
    Execute,
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Workspace => write!(f, "workspace"),
            Self::Fetch => write!(f, "fetch"),
            Self::Locate => write!(f, "locate"),
            Self::Parse => write!(f, "parse"),
            Self::Execute => write!(f, "execute"),
        }
    }
}

/// Errors that can abort a deployment.
#[derive(Debug, Error)]
pub enum DeployError {
    // ─────────────────────────────────────────────────────────────────────────
    // Request validation errors
    // ─────────────────────────────────────────────────────────────────────────
    /// No repository URL in the request.
    #[error("missing repository url")]
    MissingRepositoryUrl,

    /// Target platform host or credential missing from the request.
    #[error("missing deployment target: {0}")]
    MissingDeploymentTarget(&'static str),

    /// The request body could not be read as a JSON object.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Source errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Cloning the repository failed for any reason.
    #[error("failed to clone repository {url}: {message}")]
    RepositoryUnavailable {
        /// Repository URL as given by the caller.
        url: String,
        /// Diagnostic from the fetcher.
        message: String,
    },

    /// Clone did not finish in time.
    #[error("clone of {url} timed out after {limit:?}")]
    FetchTimeout {
        /// Repository URL as given by the caller.
        url: String,
        /// Timeout limit.
        limit: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Manifest errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The manifest path does not resolve to a directory holding a manifest.
    #[error("manifest not found at {path}: {reason}")]
    ManifestPathNotFound {
        /// Path as given by the caller.
        path: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// The manifest exists but could not be parsed.
    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Deployment errors
    // ─────────────────────────────────────────────────────────────────────────
    /// An entity deployment failed; carries the outcomes gathered so far.
    #[error("deployment of {entity} failed: {message}")]
    DeploymentFailed {
        /// Name of the entity that failed.
        entity: String,
        /// Diagnostic from the target platform.
        message: String,
        /// Outcomes in manifest order, ending with the failing entity.
        outcomes: Vec<DeploymentOutcome>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Service errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Workspace could not be created.
    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("failed to load configuration: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Stage at which this error aborts the pipeline.
    #[must_use]
    pub fn stage(&self) -> DeployStage {
        match self {
            Self::MissingRepositoryUrl
            | Self::MissingDeploymentTarget(_)
            | Self::MalformedRequest(_)
            | Self::Config(_) => DeployStage::Validate,
            Self::Workspace(_) | Self::Internal(_) => DeployStage::Workspace,
            Self::RepositoryUnavailable { .. } | Self::FetchTimeout { .. } => DeployStage::Fetch,
            Self::ManifestPathNotFound { .. } => DeployStage::Locate,
            Self::ManifestParse(_) => DeployStage::Parse,
            Self::DeploymentFailed { .. } => DeployStage::Execute,
        }
    }

    /// Message shown to the caller.
    ///
    /// Request, source and lookup failures use fixed strings; parse and
    /// deployment failures surface their diagnostic.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingRepositoryUrl => MISSING_REPOSITORY_URL_MESSAGE.to_owned(),
            Self::MissingDeploymentTarget(_) => MISSING_DEPLOYMENT_TARGET_MESSAGE.to_owned(),
            Self::MalformedRequest(_) => MALFORMED_REQUEST_MESSAGE.to_owned(),
            Self::RepositoryUnavailable { .. } | Self::FetchTimeout { .. } => {
                REPOSITORY_UNAVAILABLE_MESSAGE.to_owned()
            }
            Self::ManifestPathNotFound { .. } => MANIFEST_NOT_FOUND_MESSAGE.to_owned(),
            Self::ManifestParse(_) | Self::DeploymentFailed { .. } => self.to_string(),
            Self::Workspace(_) | Self::Config(_) | Self::Internal(_) => {
                "Internal error while preparing the deployment".to_owned()
            }
        }
    }

    /// HTTP status for this failure.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Workspace(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Per-entity outcomes carried by this error.
    #[must_use]
    pub fn outcomes(&self) -> &[DeploymentOutcome] {
        match self {
            Self::DeploymentFailed { outcomes, .. } => outcomes,
            _ => &[],
        }
    }
}

impl From<figment::Error> for DeployError {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type DeployResult<T> = Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_messages_for_source_and_lookup_failures() {
        let err = DeployError::RepositoryUnavailable {
            url: "https://example.invalid/repo".into(),
            message: "not found".into(),
        };
        assert_eq!(err.user_message(), REPOSITORY_UNAVAILABLE_MESSAGE);
        assert_eq!(err.stage(), DeployStage::Fetch);

        let timeout = DeployError::FetchTimeout {
            url: "https://example.invalid/repo".into(),
            limit: Duration::from_secs(1),
        };
        assert_eq!(timeout.user_message(), REPOSITORY_UNAVAILABLE_MESSAGE);

        let missing = DeployError::ManifestPathNotFound {
            path: "nope".into(),
            reason: "no such directory".into(),
        };
        assert_eq!(missing.user_message(), MANIFEST_NOT_FOUND_MESSAGE);
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parse_failure_surfaces_diagnostic() {
        let err = DeployError::ManifestParse("packages: expected a mapping".into());
        assert!(err.user_message().contains("expected a mapping"));
        assert_eq!(err.stage(), DeployStage::Parse);
    }

    #[test]
    fn internal_faults_map_to_server_error() {
        let err = DeployError::Internal("task panicked".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("panicked"));
    }

    #[test]
    fn stage_display() {
        assert_eq!(DeployStage::Fetch.to_string(), "fetch");
        assert_eq!(DeployStage::Execute.to_string(), "execute");
    }
}
