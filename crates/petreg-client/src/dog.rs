//! TheDogAPI client.

use petreg_core::config::VendorKind;
use petreg_core::{AppError, ExternalBreedRecord, ExternalId, HttpConfig};
use serde::Deserialize;

use crate::http::VendorHttp;

const BREEDS_PATH: &str = "v1/breeds";

/// Breed entry as returned by `GET /v1/breeds` on TheDogAPI.
///
/// TheDogAPI has no free-text description; `bred_for` is the closest field
/// and is stored as the description.
#[derive(Debug, Deserialize)]
pub struct DogBreedDto {
    pub id: ExternalId,
    pub name: String,
    #[serde(default)]
    pub bred_for: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub temperament: Option<String>,
    #[serde(default)]
    pub life_span: Option<String>,
}

impl From<DogBreedDto> for ExternalBreedRecord {
    fn from(dto: DogBreedDto) -> Self {
        ExternalBreedRecord {
            external_id: dto.id,
            name: dto.name,
            description: dto.bred_for,
            // The API sends "" for unknown origins.
            origin: dto.origin.filter(|o| !o.trim().is_empty()),
            temperament: dto.temperament,
            life_span: dto.life_span,
        }
    }
}

/// HTTP client for TheDogAPI.
#[derive(Clone)]
pub struct DogApiClient {
    http: VendorHttp,
}

impl DogApiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        config: &HttpConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http: VendorHttp::new(base_url, api_key, config)?,
        })
    }

    pub fn public(config: &HttpConfig) -> Result<Self, AppError> {
        Self::new(VendorKind::Dog.default_base_url(), None, config)
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url().as_str()
    }

    /// Fetches the full breed catalog.
    pub async fn fetch_breeds(&self) -> Result<Vec<ExternalBreedRecord>, AppError> {
        let breeds: Vec<DogBreedDto> = self.http.get_json(BREEDS_PATH).await?;
        tracing::debug!(count = breeds.len(), "Fetched dog breeds");
        Ok(breeds.into_iter().map(ExternalBreedRecord::from).collect())
    }
}
