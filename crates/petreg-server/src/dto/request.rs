//! Request DTOs for API endpoints.

use serde::Deserialize;

/// Query parameters for `GET /breeds`.
#[derive(Debug, Default, Deserialize)]
pub struct BreedsQuery {
    /// Restrict the listing to one species, by name.
    pub species: Option<String>,
}
