//! Core types for the deployment pipeline.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Declared parameters and caller overrides, keyed by parameter name.
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Correlation identifier returned with every response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationId(String);

impl ActivationId {
    /// Create an activation ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique activation ID (32 lowercase hex characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Return the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ActivationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActivationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A request to deploy the manifest found in a repository.
///
/// Every field is optional here; the orchestrator decides which absences
/// are fatal.
#[derive(Debug, Default)]
pub struct DeploymentRequest {
    /// Repository to clone.
    pub repository_url: Option<String>,
    /// Directory, relative to the repository root, holding the manifest.
    pub manifest_path: Option<String>,
    /// Values that replace manifest-declared parameters by name.
    pub environment_overrides: Parameters,
    /// Target platform API host.
    pub api_host: Option<String>,
    /// Target platform credential.
    pub auth: Option<SecretString>,
}

impl DeploymentRequest {
    /// Create a request for the given repository and manifest directory.
    #[must_use]
    pub fn new(repository_url: impl Into<String>, manifest_path: impl Into<String>) -> Self {
        Self {
            repository_url: Some(repository_url.into()),
            manifest_path: Some(manifest_path.into()),
            ..Self::default()
        }
    }

    /// Set the deployment target.
    #[must_use]
    pub fn with_target(mut self, api_host: impl Into<String>, auth: impl Into<String>) -> Self {
        self.api_host = Some(api_host.into());
        self.auth = Some(SecretString::from(auth.into()));
        self
    }

    /// Set the parameter overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Parameters) -> Self {
        self.environment_overrides = overrides;
        self
    }

    /// Repository URL, if present and not blank.
    #[must_use]
    pub fn repository_url(&self) -> Option<&str> {
        non_blank(self.repository_url.as_deref())
    }

    /// Manifest path, if present and not blank.
    #[must_use]
    pub fn manifest_path(&self) -> Option<&str> {
        non_blank(self.manifest_path.as_deref())
    }

    /// Target host and credential, if both are present and not blank.
    #[must_use]
    pub fn target(&self) -> Option<PlatformTarget> {
        let api_host = non_blank(self.api_host.as_deref())?;
        let auth = self.auth.as_ref()?;
        if auth.expose_secret().trim().is_empty() {
            return None;
        }
        Some(PlatformTarget {
            api_host: api_host.to_owned(),
            auth: SecretString::from(auth.expose_secret().to_owned()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Connection parameters for the target platform, owned by one request.
#[derive(Debug)]
pub struct PlatformTarget {
    /// API host, with or without scheme.
    pub api_host: String,
    /// Credential, `<uuid>:<key>`.
    pub auth: SecretString,
}

/// Kind of deployed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A package grouping actions.
    Package,
    /// An action.
    Action,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// Result of deploying a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    /// Fully qualified entity name (`package/action` or bare).
    pub entity_name: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Whether the platform accepted the entity.
    pub succeeded: bool,
    /// Activation or request identifier reported by the platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_id: Option<String>,
    /// Failure diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl DeploymentOutcome {
    /// A successful deployment.
    #[must_use]
    pub fn deployed(
        entity_name: impl Into<String>,
        kind: EntityKind,
        activation_id: Option<String>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            kind,
            succeeded: true,
            activation_id,
            error_detail: None,
        }
    }

    /// A failed deployment.
    #[must_use]
    pub fn failed(
        entity_name: impl Into<String>,
        kind: EntityKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            kind,
            succeeded: false,
            activation_id: None,
            error_detail: Some(detail.into()),
        }
    }
}

/// Overall status of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Every entity was deployed.
    Success,
    /// The pipeline aborted.
    Error,
}

/// The externally observable result of one deployment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    /// Overall status.
    pub status: ResultStatus,
    /// Correlation identifier, always present.
    pub activation_id: ActivationId,
    /// User-facing error message (only present on failure).
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Per-entity outcomes in manifest order.
    #[serde(rename = "entities", default)]
    pub outcomes: Vec<DeploymentOutcome>,
}

impl DeploymentResult {
    /// Check if the deployment succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_ids_are_unique_hex() {
        let a = ActivationId::generate();
        let b = ActivationId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let request = DeploymentRequest {
            repository_url: Some("   ".into()),
            manifest_path: Some(String::new()),
            ..DeploymentRequest::default()
        };
        assert!(request.repository_url().is_none());
        assert!(request.manifest_path().is_none());
        assert!(request.target().is_none());
    }

    #[test]
    fn target_requires_host_and_auth() {
        let request = DeploymentRequest::new("https://github.com/a/b", "manifests")
            .with_target("openwhisk.example.com", "user:key");
        let target = request.target().unwrap();
        assert_eq!(target.api_host, "openwhisk.example.com");
        assert_eq!(target.auth.expose_secret(), "user:key");

        let no_auth = DeploymentRequest {
            api_host: Some("openwhisk.example.com".into()),
            ..DeploymentRequest::default()
        };
        assert!(no_auth.target().is_none());
    }

    #[test]
    fn credential_is_redacted_in_debug() {
        let request = DeploymentRequest::new("https://github.com/a/b", "m")
            .with_target("host", "super-secret-key");
        assert!(!format!("{request:?}").contains("super-secret-key"));
    }

    #[test]
    fn result_serialises_with_wire_names() {
        let result = DeploymentResult {
            status: ResultStatus::Error,
            activation_id: ActivationId::new("abc"),
            error_message: Some("boom".into()),
            outcomes: vec![DeploymentOutcome::failed("pkg/act", EntityKind::Action, "409")],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["activationId"], "abc");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["entities"][0]["entityName"], "pkg/act");
        assert_eq!(json["entities"][0]["errorDetail"], "409");
        assert!(json["entities"][0].get("activationId").is_none());
    }

    #[test]
    fn success_result_omits_error() {
        let result = DeploymentResult {
            status: ResultStatus::Success,
            activation_id: ActivationId::generate(),
            error_message: None,
            outcomes: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("error").is_none());
    }
}
