//! # Breathelytics Common Library
//!
//! Shared code for the Breathelytics analysis service and its tooling:
//! - Bootstrap configuration (TOML + environment resolution)
//! - The fixed disease label enumeration used by the classifier
//! - Static disease catalog
//! - Common error type

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{DiseaseLabel, LabelOutOfRange};
pub use error::{Error, Result};
