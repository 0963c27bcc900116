//! Response DTOs for API endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use petreg_core::{
    Breed, CircuitBreakerStats, ExternalBreedRecord, FallbackReason, Guarded, JobSnapshot,
    RunReport, Species,
};

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
}

/// Status of an individual service component.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    /// Whether the service is reachable
    pub healthy: bool,
    /// Optional message (e.g., error details)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SpeciesResponse {
    pub id: i64,
    pub name: String,
}

impl From<Species> for SpeciesResponse {
    fn from(s: Species) -> Self {
        Self {
            id: s.id,
            name: s.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BreedResponse {
    pub id: i64,
    pub name: String,
    pub species_id: i64,
    pub external_api_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Breed> for BreedResponse {
    fn from(b: Breed) -> Self {
        Self {
            id: b.id,
            name: b.name,
            species_id: b.species_id,
            external_api_id: b.external_api_id,
            created_at: b.created_at,
        }
    }
}

// =============================================================================
// Sync
// =============================================================================

/// Circuit breaker state for one vendor.
#[derive(Debug, Serialize)]
pub struct CircuitResponse {
    pub name: String,
    /// "closed", "open" or "half-open"
    pub state: String,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Seconds until an open circuit admits a probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<CircuitBreakerStats> for CircuitResponse {
    fn from(s: CircuitBreakerStats) -> Self {
        Self {
            name: s.name,
            state: s.state.to_string(),
            failure_count: s.failure_count,
            last_error: s.last_error,
            retry_after_secs: s.time_until_half_open.map(|d| d.as_secs()),
        }
    }
}

/// Outcome of a run, as returned by `POST /sync/:vendor` and in status listings.
#[derive(Debug, Serialize)]
pub struct SyncRunResponse {
    pub job: String,
    pub trigger: String,
    /// "completed", "skipped" or "failed"
    pub status: String,
    pub success: bool,
    pub inserted: usize,
    pub fetched: usize,
    /// True when the vendor was unavailable and the empty fallback was used
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl From<&RunReport> for SyncRunResponse {
    fn from(r: &RunReport) -> Self {
        let fallback_reason = r.sync_report().and_then(|s| match &s.fetch {
            petreg_core::FetchSource::Fallback(reason) => Some(reason.to_string()),
            petreg_core::FetchSource::Live => None,
        });

        Self {
            job: r.job.clone(),
            trigger: r.trigger.to_string(),
            status: r.status_label().to_string(),
            success: r.is_success(),
            inserted: r.inserted(),
            fetched: r.fetched(),
            fallback: r.fallback(),
            fallback_reason,
            error: r.error().map(str::to_string),
            started_at: r.started_at,
            finished_at: r.finished_at,
        }
    }
}

/// One entry of `GET /sync/status`.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job: String,
    pub vendor: String,
    pub species: String,
    /// "idle", "acquiring_lock" or "running"
    pub state: String,
    pub cron: String,
    pub timezone: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub last_run: Option<SyncRunResponse>,
    pub circuit: CircuitResponse,
}

impl From<JobSnapshot> for JobStatusResponse {
    fn from(s: JobSnapshot) -> Self {
        Self {
            job: s.job,
            vendor: s.vendor,
            species: s.species,
            state: s.state.to_string(),
            cron: s.cron,
            timezone: s.timezone,
            next_fire: s.next_fire,
            last_run: s.last_run.as_ref().map(SyncRunResponse::from),
            circuit: s.circuit.into(),
        }
    }
}

// =============================================================================
// Vendor preview
// =============================================================================

/// Breed as reported by a vendor, before reconciliation.
#[derive(Debug, Serialize)]
pub struct VendorBreedDto {
    pub external_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperament: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub life_span: Option<String>,
}

impl From<ExternalBreedRecord> for VendorBreedDto {
    fn from(r: ExternalBreedRecord) -> Self {
        Self {
            external_id: r.external_id.normalized(),
            name: r.name,
            description: r.description,
            origin: r.origin,
            temperament: r.temperament,
            life_span: r.life_span,
        }
    }
}

/// `GET /vendors/:vendor/breeds` response.
#[derive(Debug, Serialize)]
pub struct VendorPreviewResponse {
    pub vendor: String,
    /// True when the breed list is the fallback, not vendor data
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub breeds: Vec<VendorBreedDto>,
}

impl VendorPreviewResponse {
    pub fn new(vendor: impl Into<String>, result: Guarded<Vec<ExternalBreedRecord>>) -> Self {
        let reason = result.fallback_reason().map(FallbackReason::to_string);
        Self {
            vendor: vendor.into(),
            fallback: result.is_fallback(),
            reason,
            breeds: result
                .into_value()
                .into_iter()
                .map(VendorBreedDto::from)
                .collect(),
        }
    }
}
