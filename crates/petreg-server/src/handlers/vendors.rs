//! Vendor preview endpoint.

use axum::{
    Json,
    extract::{Path, State},
};

use petreg_core::traits::BreedSource;

use crate::dto::VendorPreviewResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Fetch a vendor's current breed list without storing it.
///
/// The call goes through the vendor's circuit breaker, so an unavailable
/// vendor answers 200 with `fallback: true` and an empty list.
pub async fn preview_vendor_breeds(
    State(state): State<AppState>,
    Path(vendor): Path<String>,
) -> Result<Json<VendorPreviewResponse>, ApiError> {
    let job = state
        .scheduler
        .job(&vendor)
        .ok_or_else(|| ApiError::NotFound(format!("No sync job for vendor '{}'", vendor)))?;

    let source = job.source();
    let result = job.guard().call(|| source.fetch_all()).await;

    Ok(Json(VendorPreviewResponse::new(source.vendor_key(), result)))
}
