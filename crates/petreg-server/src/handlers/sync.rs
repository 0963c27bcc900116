//! Sync status, manual trigger and circuit reset endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::dto::{CircuitResponse, JobStatusResponse, SyncRunResponse};
use crate::error::ApiError;
use crate::state::AppState;

fn unknown_vendor(vendor: &str) -> ApiError {
    ApiError::NotFound(format!("No sync job for vendor '{}'", vendor))
}

/// Status of every vendor job.
pub async fn get_sync_status(State(state): State<AppState>) -> Json<Vec<JobStatusResponse>> {
    Json(
        state
            .scheduler
            .snapshot()
            .into_iter()
            .map(JobStatusResponse::from)
            .collect(),
    )
}

/// Run one vendor now and wait for the result.
///
/// The run takes the same lock as scheduled runs, so it reports `skipped`
/// when another run holds it. A failed run answers 500 with the error in
/// the body.
pub async fn trigger_vendor_sync(
    State(state): State<AppState>,
    Path(vendor): Path<String>,
) -> Result<(StatusCode, Json<SyncRunResponse>), ApiError> {
    tracing::info!(vendor = %vendor, "Manual sync requested");

    let report = state
        .scheduler
        .trigger(&vendor)
        .await
        .ok_or_else(|| unknown_vendor(&vendor))?;

    let body = SyncRunResponse::from(&report);
    let status = if report.error().is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    Ok((status, Json(body)))
}

/// Close a vendor's circuit breaker.
pub async fn reset_vendor_circuit(
    State(state): State<AppState>,
    Path(vendor): Path<String>,
) -> Result<Json<CircuitResponse>, ApiError> {
    let job = state
        .scheduler
        .job(&vendor)
        .ok_or_else(|| unknown_vendor(&vendor))?;

    let breaker = job.guard().breaker();
    breaker.reset();
    tracing::info!(vendor = %vendor, "Circuit breaker reset by admin");

    Ok(Json(breaker.stats().into()))
}
