//! Breed source factory and dispatch.
//!
//! [`BreedSource`] uses `impl Future` return types and is not object-safe, so
//! runtime vendor selection goes through [`BreedSourceEnum`].
//!
//! # Usage
//!
//! ```no_run
//! use petreg_client::BreedSourceEnum;
//! use petreg_core::traits::BreedSource;
//! use petreg_core::{HttpConfig, SyncSettings};
//!
//! # async fn example() -> Result<(), petreg_core::AppError> {
//! let settings = SyncSettings::builtin();
//! for entry in settings.enabled_vendors() {
//!     let source = BreedSourceEnum::from_vendor(entry, &settings.http)?;
//!     let breeds = source.fetch_all().await?;
//!     println!("{}: {} breeds", source.vendor_key(), breeds.len());
//! }
//! # Ok(())
//! # }
//! ```

use petreg_core::config::{VendorEntry, VendorKind};
use petreg_core::traits::BreedSource;
use petreg_core::{AppError, ExternalBreedRecord, HttpConfig};

use crate::{CatApiClient, DogApiClient};

/// A configured vendor, tagged with the key it was registered under.
#[derive(Clone)]
pub enum BreedSourceEnum {
    Cat { key: String, client: CatApiClient },
    Dog { key: String, client: DogApiClient },
}

impl BreedSourceEnum {
    /// Builds the client for a configured vendor entry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` when the entry's base URL is malformed.
    pub fn from_vendor(entry: &VendorEntry, http: &HttpConfig) -> Result<Self, AppError> {
        let key = entry.name.clone();
        let api_key = entry.api_key.clone();

        Ok(match entry.kind {
            VendorKind::Cat => Self::Cat {
                key,
                client: CatApiClient::new(entry.base_url(), api_key, http)?,
            },
            VendorKind::Dog => Self::Dog {
                key,
                client: DogApiClient::new(entry.base_url(), api_key, http)?,
            },
        })
    }

    pub fn kind(&self) -> VendorKind {
        match self {
            Self::Cat { .. } => VendorKind::Cat,
            Self::Dog { .. } => VendorKind::Dog,
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Self::Cat { client, .. } => client.base_url(),
            Self::Dog { client, .. } => client.base_url(),
        }
    }
}

impl BreedSource for BreedSourceEnum {
    fn vendor_key(&self) -> &str {
        match self {
            Self::Cat { key, .. } | Self::Dog { key, .. } => key,
        }
    }

    async fn fetch_all(&self) -> Result<Vec<ExternalBreedRecord>, AppError> {
        match self {
            Self::Cat { client, .. } => client.fetch_breeds().await,
            Self::Dog { client, .. } => client.fetch_breeds().await,
        }
    }
}
