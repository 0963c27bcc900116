//! TheCatAPI client.

use petreg_core::config::VendorKind;
use petreg_core::{AppError, ExternalBreedRecord, ExternalId, HttpConfig};
use serde::Deserialize;

use crate::http::VendorHttp;

const BREEDS_PATH: &str = "v1/breeds";

/// Breed entry as returned by `GET /v1/breeds` on TheCatAPI.
///
/// Only the fields the registry keeps are decoded; the rest of the payload
/// (weights, ratings, image references) is ignored.
#[derive(Debug, Deserialize)]
pub struct CatBreedDto {
    pub id: ExternalId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub temperament: Option<String>,
    #[serde(default)]
    pub life_span: Option<String>,
}

impl From<CatBreedDto> for ExternalBreedRecord {
    fn from(dto: CatBreedDto) -> Self {
        ExternalBreedRecord {
            external_id: dto.id,
            name: dto.name,
            description: dto.description,
            origin: dto.origin,
            temperament: dto.temperament,
            life_span: dto.life_span,
        }
    }
}

/// HTTP client for TheCatAPI.
///
/// # Example
///
/// ```no_run
/// use petreg_client::CatApiClient;
/// use petreg_core::HttpConfig;
///
/// # async fn example() -> Result<(), petreg_core::AppError> {
/// let client = CatApiClient::new("https://api.thecatapi.com", None, &HttpConfig::default())?;
/// let breeds = client.fetch_breeds().await?;
/// println!("{} cat breeds", breeds.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CatApiClient {
    http: VendorHttp,
}

impl CatApiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        config: &HttpConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http: VendorHttp::new(base_url, api_key, config)?,
        })
    }

    /// Client pointed at the public TheCatAPI endpoint.
    pub fn public(config: &HttpConfig) -> Result<Self, AppError> {
        Self::new(VendorKind::Cat.default_base_url(), None, config)
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url().as_str()
    }

    /// Fetches the full breed catalog.
    pub async fn fetch_breeds(&self) -> Result<Vec<ExternalBreedRecord>, AppError> {
        let breeds: Vec<CatBreedDto> = self.http.get_json(BREEDS_PATH).await?;
        tracing::debug!(count = breeds.len(), "Fetched cat breeds");
        Ok(breeds.into_iter().map(ExternalBreedRecord::from).collect())
    }
}
