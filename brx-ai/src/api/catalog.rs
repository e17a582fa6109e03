//! Read-only views: disease catalog, pipeline configuration, model info

use axum::{extract::State, routing::get, Json, Router};
use brx_common::catalog::{disease_catalog, DiseaseInfo};
use chrono::Utc;
use serde::Serialize;

use crate::services::ModelInfo;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct DiseasesResponse {
    pub diseases: Vec<DiseaseInfo>,
    pub total_count: usize,
    pub timestamp: String,
}

/// GET /api/diseases
pub async fn list_diseases() -> Json<DiseasesResponse> {
    let diseases = disease_catalog();
    Json(DiseasesResponse {
        total_count: diseases.len(),
        diseases,
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct PipelineStatusResponse {
    pub pipeline_loaded: bool,
    /// Seconds every clip is padded/truncated to
    pub target_duration: f64,
    pub excluded_features: Vec<String>,
    pub steps: Vec<String>,
    pub timestamp: String,
}

/// GET /api/pipeline/status
pub async fn pipeline_status(State(state): State<AppState>) -> Json<PipelineStatusResponse> {
    let pipeline = state.engine.pipeline();
    Json(PipelineStatusResponse {
        pipeline_loaded: state.engine.is_model_loaded(),
        target_duration: pipeline.target_duration_seconds(),
        excluded_features: pipeline.excluded_features().to_vec(),
        steps: pipeline.steps().iter().map(|s| s.to_string()).collect(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// GET /api/model
///
/// Loads the classifier if it is not cached yet.
pub async fn model_info(State(state): State<AppState>) -> ApiResult<Json<ModelInfo>> {
    let engine = state.engine.clone();
    let info = tokio::task::spawn_blocking(move || engine.model_info())
        .await
        .map_err(|e| ApiError::Internal(format!("model info task failed: {}", e)))??;
    Ok(Json(info))
}

pub fn disease_routes() -> Router<AppState> {
    Router::new().route("/diseases", get(list_diseases))
}

pub fn pipeline_routes() -> Router<AppState> {
    Router::new().route("/pipeline/status", get(pipeline_status))
}

pub fn model_routes() -> Router<AppState> {
    Router::new().route("/model", get(model_info))
}
