//! Mapping pipeline results to the response shape.

use axum::http::StatusCode;

use crate::error::DeployResult;
use crate::types::{ActivationId, DeploymentOutcome, DeploymentResult, ResultStatus};

/// Build the response for one request.
///
/// Every result carries `activation_id`, whatever stage the pipeline reached.
#[must_use]
pub fn report(
    outcome: DeployResult<Vec<DeploymentOutcome>>,
    activation_id: ActivationId,
) -> (StatusCode, DeploymentResult) {
    match outcome {
        Ok(outcomes) => (
            StatusCode::OK,
            DeploymentResult {
                status: ResultStatus::Success,
                activation_id,
                error_message: None,
                outcomes,
            },
        ),
        Err(e) => (
            e.status_code(),
            DeploymentResult {
                status: ResultStatus::Error,
                activation_id,
                error_message: Some(e.user_message()),
                outcomes: e.outcomes().to_vec(),
            },
        ),
    }
}
