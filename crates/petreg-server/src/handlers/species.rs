//! Species endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use petreg_core::traits::BreedStore;

use crate::dto::{BreedResponse, SpeciesResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// List all species.
pub async fn list_species(
    State(state): State<AppState>,
) -> Result<Json<Vec<SpeciesResponse>>, ApiError> {
    let species = state.species_repo.list_all().await?;
    Ok(Json(species.into_iter().map(SpeciesResponse::from).collect()))
}

/// List the breeds of one species.
pub async fn list_species_breeds(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<BreedResponse>>, ApiError> {
    let species = state
        .species_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Species not found: {}", id)))?;

    let breeds = state.breed_repo.find_by_species(species.id).await?;
    Ok(Json(breeds.into_iter().map(BreedResponse::from).collect()))
}
