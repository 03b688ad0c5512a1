//! # Vocabulary Registry Common Library
//!
//! Shared code for the registry service including:
//! - IRI identity model (address composition and decomposition)
//! - Database schema and models
//! - Event types and the in-process event bus
//! - Credential hashing
//! - Configuration loading

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod events;
pub mod iri;

pub use error::{Error, Result};
pub use iri::{IriComponents, TermType};
