//! Entity deployment against the target platform.
//!
//! The executor walks a manifest in order, creating each package and then
//! its actions through a [`DeploymentBackend`]. The first failure stops the
//! walk; entities already created are left in place.

mod whisk;

pub use whisk::WhiskBackend;

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::{DeployError, DeployResult};
use crate::manifest::{ActionRuntime, ManifestDescriptor};
use crate::types::{ActivationId, DeploymentOutcome, EntityKind, Parameters, PlatformTarget};

/// Errors reported by a deployment backend for a single entity.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The platform answered with a non-success status.
    #[error("platform returned {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Platform diagnostic.
        message: String,
    },

    /// The target host is not usable.
    #[error("invalid api host: {0}")]
    InvalidTarget(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// What the platform returned for an accepted entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityReceipt {
    /// Identifier the platform attached to the call, if any.
    pub activation_id: Option<String>,
}

/// A package to create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDeployment {
    /// Resolved package name.
    pub name: String,
    /// Package-bound parameters.
    pub parameters: Parameters,
}

/// An action to create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDeployment {
    /// Enclosing package; `None` for actions of the `default` package.
    pub package: Option<String>,
    /// Resolved action name.
    pub name: String,
    /// Action-bound parameters.
    pub parameters: Parameters,
    /// Source code of the function.
    pub code: String,
    /// Runtime metadata.
    pub runtime: ActionRuntime,
}

impl ActionDeployment {
    /// `package/action`, or the bare action name outside a package.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(package) => format!("{package}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Creates entities on the target platform.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Create or update a package.
    async fn deploy_package(
        &self,
        target: &PlatformTarget,
        package: &PackageDeployment,
        activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError>;

    /// Create or update an action.
    async fn deploy_action(
        &self,
        target: &PlatformTarget,
        action: &ActionDeployment,
        activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError>;
}

/// Deploy every entity in `descriptor`, in manifest order.
///
/// Stops at the first failure and returns
/// [`DeployError::DeploymentFailed`] carrying the outcomes so far, the
/// failing entity last.
#[instrument(skip_all, fields(activation_id = %activation, packages = descriptor.packages.len()))]
pub async fn execute(
    descriptor: &ManifestDescriptor,
    target: &PlatformTarget,
    backend: &dyn DeploymentBackend,
    activation: &ActivationId,
) -> DeployResult<Vec<DeploymentOutcome>> {
    let mut outcomes = Vec::with_capacity(descriptor.packages.len() + descriptor.action_count());

    for package in &descriptor.packages {
        let package_name = if package.is_default() {
            None
        } else {
            let name = package.resolved_name();
            if let Err(message) = check_entity_name(&name) {
                return Err(fail(outcomes, name, EntityKind::Package, message));
            }

            let deployment = PackageDeployment {
                name: name.clone(),
                parameters: package.parameters.clone(),
            };
            match backend.deploy_package(target, &deployment, activation).await {
                Ok(receipt) => {
                    debug!(package = %name, "package deployed");
                    outcomes.push(DeploymentOutcome::deployed(
                        &name,
                        EntityKind::Package,
                        receipt.activation_id,
                    ));
                }
                Err(e) => return Err(fail(outcomes, name, EntityKind::Package, e.to_string())),
            }
            Some(name)
        };

        for action in &package.actions {
            let name = action.resolved_name(package);
            let display_name = match &package_name {
                Some(p) => format!("{p}/{name}"),
                None => name.clone(),
            };
            if let Err(message) = check_entity_name(&name) {
                return Err(fail(outcomes, display_name, EntityKind::Action, message));
            }

            let code = match tokio::fs::read_to_string(&action.runtime.function).await {
                Ok(code) => code,
                Err(e) => {
                    let function = &action.runtime.function;
                    let shown = function
                        .strip_prefix(&descriptor.base_dir)
                        .unwrap_or(function);
                    let message = format!("failed to read {}: {e}", shown.display());
                    return Err(fail(outcomes, display_name, EntityKind::Action, message));
                }
            };

            let deployment = ActionDeployment {
                package: package_name.clone(),
                name,
                parameters: action.parameters.clone(),
                code,
                runtime: action.runtime.clone(),
            };
            match backend.deploy_action(target, &deployment, activation).await {
                Ok(receipt) => {
                    debug!(
                        action = %display_name,
                        kind = %deployment.runtime.kind,
                        "action deployed"
                    );
                    outcomes.push(DeploymentOutcome::deployed(
                        display_name,
                        EntityKind::Action,
                        receipt.activation_id,
                    ));
                }
                Err(e) => {
                    return Err(fail(outcomes, display_name, EntityKind::Action, e.to_string()))
                }
            }
        }
    }

    info!(entities = outcomes.len(), "all entities deployed");
    Ok(outcomes)
}

fn fail(
    mut outcomes: Vec<DeploymentOutcome>,
    entity: String,
    kind: EntityKind,
    message: String,
) -> DeployError {
    warn!(entity = %entity, %kind, error = %message, "entity deployment failed");
    outcomes.push(DeploymentOutcome::failed(&entity, kind, &message));
    DeployError::DeploymentFailed {
        entity,
        message,
        outcomes,
    }
}

/// Entity names must be non-empty single path segments.
fn check_entity_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("entity name resolved to an empty string".to_owned());
    }
    if name.contains('/') {
        return Err(format!("entity name {name} must not contain '/'"));
    }
    // URL path building drops dot segments.
    if name == "." || name == ".." {
        return Err(format!("entity name {name} is not a valid path segment"));
    }
    Ok(())
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// A package deployment.
    Package(PackageDeployment),
    /// An action deployment.
    Action(ActionDeployment),
}

impl RecordedCall {
    /// Qualified name of the entity deployed.
    #[must_use]
    pub fn entity_name(&self) -> String {
        match self {
            Self::Package(p) => p.name.clone(),
            Self::Action(a) => a.qualified_name(),
        }
    }
}

/// In-memory backend for testing.
///
/// Records every call and rejects the entity named by
/// [`MockBackend::failing_on`].
#[derive(Debug, Default)]
pub struct MockBackend {
    calls: Mutex<Vec<RecordedCall>>,
    fail_on: Option<String>,
}

impl MockBackend {
    /// A backend that rejects the entity with the given qualified name.
    #[must_use]
    pub fn failing_on(entity: impl Into<String>) -> Self {
        Self {
            calls: Mutex::default(),
            fail_on: Some(entity.into()),
        }
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: RecordedCall) -> Result<EntityReceipt, BackendError> {
        let name = call.entity_name();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(BackendError::Rejected {
                status: 409,
                message: format!("{name} conflicts with an existing entity"),
            });
        }
        Ok(EntityReceipt {
            activation_id: Some(format!("mock-{name}")),
        })
    }
}

#[async_trait]
impl DeploymentBackend for MockBackend {
    async fn deploy_package(
        &self,
        _target: &PlatformTarget,
        package: &PackageDeployment,
        _activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError> {
        self.record(RecordedCall::Package(package.clone()))
    }

    async fn deploy_action(
        &self,
        _target: &PlatformTarget,
        action: &ActionDeployment,
        _activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError> {
        self.record(RecordedCall::Action(action.clone()))
    }
}
