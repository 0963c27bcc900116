//! Petreg Client - HTTP clients for the breed vendor APIs
//!
//! This crate provides HTTP clients for:
//!
//! - [`cat`] - TheCatAPI breed catalog
//! - [`dog`] - TheDogAPI breed catalog
//!
//! # Overview
//!
//! Both vendors share request building, retries and error classification
//! through [`http::VendorHttp`]. [`BreedSourceEnum`] selects a vendor at
//! runtime from configuration and implements
//! [`petreg_core::traits::BreedSource`].

pub mod cat;
pub mod dog;
pub mod http;
pub mod source;

// Re-export main client types
pub use cat::CatApiClient;
pub use dog::DogApiClient;
pub use source::BreedSourceEnum;
