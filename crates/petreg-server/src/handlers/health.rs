//! Health check endpoint.

use axum::{Json, extract::State};

use crate::dto::{HealthResponse, ServiceStatus};
use crate::state::AppState;

/// Health check endpoint.
///
/// Reports the server version and whether the database answers. A database
/// outage degrades the status but still returns 200.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => ServiceStatus {
            healthy: true,
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ServiceStatus {
                healthy: false,
                message: Some(e.to_string()),
            }
        }
    };

    let status = if database.healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}
