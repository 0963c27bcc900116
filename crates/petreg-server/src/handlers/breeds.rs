//! Breed listing endpoint.

use axum::{
    Json,
    extract::{Query, State},
};

use petreg_core::traits::{BreedStore, SpeciesStore};

use crate::dto::{BreedResponse, BreedsQuery};
use crate::error::ApiError;
use crate::state::AppState;

/// List breeds, optionally restricted to `?species=<name>`.
pub async fn list_breeds(
    State(state): State<AppState>,
    Query(query): Query<BreedsQuery>,
) -> Result<Json<Vec<BreedResponse>>, ApiError> {
    let breeds = match query.species.as_deref() {
        Some(name) => {
            let species = state.species_repo.find_by_name(name).await?;
            state.breed_repo.find_by_species(species.id).await?
        }
        None => state.breed_repo.list_all().await?,
    };

    Ok(Json(breeds.into_iter().map(BreedResponse::from).collect()))
}
