//! Domain models for species, breeds and vendor breed records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A species row (seed data, read-only for the sync pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Species {
    pub id: i64,
    pub name: String,
}

/// A persisted breed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Breed {
    pub id: i64,
    pub name: String,
    pub species_id: i64,
    /// Vendor identifier in normalized string form, if the breed was synced.
    pub external_api_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A breed candidate for insertion. The identifier is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBreed {
    pub name: String,
    pub species_id: i64,
    pub external_api_id: Option<String>,
}

/// Identifier of a breed in a vendor catalog.
///
/// TheDogAPI uses integers, TheCatAPI uses short strings (`"abys"`). Both are
/// accepted and compared through [`ExternalId::normalized`], so `1` and `"1"`
/// refer to the same breed.
///
/// # Examples
///
/// ```
/// use petreg_core::models::ExternalId;
///
/// let numeric: ExternalId = serde_json::from_str("1").unwrap();
/// let text: ExternalId = serde_json::from_str("\"1\"").unwrap();
/// assert_eq!(numeric.normalized(), text.normalized());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Numeric(i64),
    Text(String),
}

impl ExternalId {
    /// Canonical string form used for dedup and storage.
    pub fn normalized(&self) -> String {
        match self {
            ExternalId::Numeric(n) => n.to_string(),
            ExternalId::Text(s) => s.trim().to_string(),
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl From<i64> for ExternalId {
    fn from(value: i64) -> Self {
        ExternalId::Numeric(value)
    }
}

impl From<i32> for ExternalId {
    fn from(value: i32) -> Self {
        ExternalId::Numeric(value.into())
    }
}

impl From<&str> for ExternalId {
    fn from(value: &str) -> Self {
        ExternalId::Text(value.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(value: String) -> Self {
        ExternalId::Text(value)
    }
}

/// Raw breed record as returned by a vendor, before reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBreedRecord {
    pub external_id: ExternalId,
    pub name: String,
    pub description: Option<String>,
    pub origin: Option<String>,
    pub temperament: Option<String>,
    pub life_span: Option<String>,
}

impl ExternalBreedRecord {
    /// Creates a record with only the identifying fields set.
    pub fn new(external_id: impl Into<ExternalId>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            description: None,
            origin: None,
            temperament: None,
            life_span: None,
        }
    }

    /// Maps this record into an insert candidate bound to `species_id`.
    pub fn into_new_breed(self, species_id: i64) -> NewBreed {
        NewBreed {
            name: self.name.trim().to_string(),
            species_id,
            external_api_id: Some(self.external_id.normalized()),
        }
    }
}
