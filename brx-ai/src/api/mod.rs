//! HTTP API handlers for brx-ai

pub mod catalog;
pub mod health;
pub mod predict;

pub use catalog::{disease_routes, model_routes, pipeline_routes};
pub use health::health_routes;
pub use predict::predict_routes;

use crate::ApiError;
use axum::extract::OriginalUri;
use axum::http::{Method, Uri};

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No endpoint at {}", uri.path()))
}

/// Fallback for known routes hit with an unsupported method
pub async fn method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::MethodNotAllowed(format!("{} is not supported on {}", method, uri.path()))
}
