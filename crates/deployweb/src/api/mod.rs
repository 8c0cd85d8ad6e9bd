//! HTTP API for the deployment service.
//!
//! Provides endpoints for:
//! - Deploying the manifest of a git repository (`POST /deploy`)
//! - Health and readiness checks

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DeployError;
use crate::orchestrator::Orchestrator;
use crate::report::report;
use crate::types::{ActivationId, DeploymentRequest, DeploymentResult, Parameters};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline run for each request.
    pub orchestrator: Arc<Orchestrator>,
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Deployment
        .route("/deploy", post(deploy))
        .with_state(state)
}

/// Body of `POST /deploy`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployParams {
    /// Repository to clone.
    pub git_url: Option<String>,
    /// Manifest directory inside the repository.
    pub manifest_path: Option<String>,
    /// Overrides for manifest-declared parameters.
    pub env_data: Option<Parameters>,
    /// Target platform API host.
    pub wsk_api_host: Option<String>,
    /// Target platform credential.
    pub wsk_auth: Option<String>,
}

impl From<DeployParams> for DeploymentRequest {
    fn from(params: DeployParams) -> Self {
        Self {
            repository_url: params.git_url,
            manifest_path: params.manifest_path,
            environment_overrides: params.env_data.unwrap_or_default(),
            api_host: params.wsk_api_host,
            auth: params.wsk_auth.map(SecretString::from),
        }
    }
}

/// Deploy endpoint.
async fn deploy(
    State(state): State<AppState>,
    payload: Result<Json<DeployParams>, JsonRejection>,
) -> (StatusCode, Json<DeploymentResult>) {
    let params = match payload {
        Ok(Json(params)) => params,
        Err(rejection) => {
            let (status, result) = report(
                Err(DeployError::MalformedRequest(rejection.body_text())),
                ActivationId::generate(),
            );
            warn!(
                activation_id = %result.activation_id,
                error = %rejection,
                "rejected request body"
            );
            return (status, Json(result));
        }
    };

    info!(
        manifest_path = params.manifest_path.as_deref().unwrap_or(""),
        overrides = params.env_data.as_ref().map_or(0, |d| d.len()),
        "deployment requested"
    );

    let (status, result) = state.orchestrator.deploy(params.into()).await;
    (status, Json(result))
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let workspaces = state.orchestrator.workspaces();
    match tokio::fs::create_dir_all(workspaces.root()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                active_workspaces: workspaces.active_count(),
            }),
        ),
        Err(e) => {
            warn!(root = %workspaces.root().display(), error = %e, "workspace root unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    active_workspaces: 0,
                }),
            )
        }
    }
}

/// Health response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Readiness response.
#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    active_workspaces: usize,
}
