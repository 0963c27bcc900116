//! Petreg Server - REST API and breed sync host
//!
//! This crate runs the breed sync scheduler and exposes it over HTTP:
//!
//! - **Registry**: species and breed listings
//! - **Sync**: per-vendor job status, manual triggers (admin) and circuit resets (admin)
//! - **Vendors**: live preview of a vendor's breed list through its circuit breaker

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::{AppState, BreedScheduler};
