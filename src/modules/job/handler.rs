use super::dto::{AdvanceResponse, JobStatusResponse};
use super::error::JobError;
use super::service::JobService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

fn error_response(e: JobError) -> ApiError {
    let status = match e {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError(e.to_string(), status)
}

/// Perform the next unit of work on a job
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/advance",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Step outcome", body = ApiResponse<AdvanceResponse>),
        (status = 404, description = "Job not found"),
        (status = 500, description = "Step failed; the job is now failed")
    ),
    tag = "Jobs"
)]
pub async fn advance_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match JobService::advance(state, id).await {
        Ok(outcome) => ApiSuccess(
            ApiResponse::success(outcome, "Job advanced"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// Get job progress
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job progress", body = ApiResponse<JobStatusResponse>),
        (status = 404, description = "Job not found")
    ),
    tag = "Jobs"
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match JobService::status(state, id).await {
        Ok(status) => ApiSuccess(
            ApiResponse::success(status, "Job status retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
