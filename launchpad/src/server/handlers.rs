//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use launchpad_models::{ErrorResponse, HealthResponse, VersionResponse};
use serde::Deserialize;
use tracing::error;

use crate::errors::PipelineError;
use crate::recovery::service::DEFAULT_HEALTH_WINDOW_DAYS;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error mapped onto a status code and an `ErrorResponse` body
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            PipelineError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            PipelineError::ValidationFailure(_) => (StatusCode::BAD_REQUEST, "validation_failure"),
            e => {
                error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        let body = ErrorResponse {
            error: kind.to_string(),
            message: self.0.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "launchpad".to_string(),
        version: version.version,
        in_flight: state.deployments.dispatcher().in_flight().len(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    pub window_hours: Option<u32>,
}

/// Rolling deployment metrics
pub async fn metrics_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<MetricsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let window_hours = params.window_hours.unwrap_or(state.default_window_hours);
    if !(1..=720).contains(&window_hours) {
        return Err(PipelineError::ValidationFailure(format!(
            "window_hours must be within 1..=720, got {window_hours}"
        ))
        .into());
    }
    Ok(Json(state.monitor.metrics(window_hours).await?))
}

/// Single deployment record
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.deployments.get(&id).await?;
    Ok(Json(record.to_response()))
}

#[derive(Debug, Deserialize)]
pub struct HealthParams {
    pub window_days: Option<u32>,
}

/// Repository health score
pub async fn repository_health_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(params): Query<HealthParams>,
) -> Result<impl IntoResponse, ApiError> {
    let window_days = params.window_days.unwrap_or(DEFAULT_HEALTH_WINDOW_DAYS);
    Ok(Json(state.recovery.health_score(&id, window_days).await?))
}
