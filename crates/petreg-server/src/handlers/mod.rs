//! HTTP request handlers for API endpoints.

pub mod breeds;
pub mod health;
pub mod species;
pub mod sync;
pub mod vendors;
