//! Prediction endpoint
//!
//! POST /api/predict with a multipart `audio` field. The upload is written to
//! a per-request temp file that is deleted on every exit path.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use brx_common::config::ServerConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use crate::models::{FeatureRecord, InsightResult, ProbabilityDistribution};
use crate::services::recommendations::{confidence_interpretation, format_file_size, health_recommendations};
use crate::services::TempAudioFile;
use crate::utils::{file_extension, is_allowed_audio_file, safe_filename};
use crate::{ApiError, ApiResult, AppState};

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct PredictQuery {
    /// Attach an explanation (remote or fallback)
    #[serde(default)]
    pub insights: bool,
    /// Attach features, timings and recommendations
    #[serde(default)]
    pub detailed: bool,
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub original_filename: String,
    pub file_size: u64,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PredictionMetrics {
    pub processing_time_ms: u64,
    pub audio_duration_ms: u64,
    pub feature_extraction_time_ms: u64,
    pub prediction_time_ms: u64,
    pub file_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f64,
    pub prediction_code: usize,
    pub all_probabilities: ProbabilityDistribution,
    pub timestamp: String,
    pub file_info: FileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<InsightResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PredictionMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_interpretation: Option<String>,
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

fn too_large(max_file_size: u64) -> ApiError {
    ApiError::BadRequest(format!("File too large. Maximum size: {} bytes", max_file_size))
}

fn multipart_error(e: MultipartError, max_file_size: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_file_size)
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// First `audio` field of the form
async fn read_upload(multipart: &mut Multipart, max_file_size: u64) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, max_file_size))?;
        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest("No audio file provided in request".to_string()))
}

/// POST /api/predict
pub async fn predict(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<PredictResponse>> {
    let start = Instant::now();
    let server = &state.config.server;

    let upload = read_upload(&mut multipart, server.max_file_size_bytes).await?;
    if upload.filename.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }
    if !is_allowed_audio_file(&upload.filename, &server.allowed_extensions) {
        return Err(ApiError::BadRequest(format!(
            "Invalid audio file format. Please upload {} files.",
            server.allowed_extensions.join(", ").to_uppercase()
        )));
    }
    let file_size = upload.bytes.len() as u64;
    if file_size > server.max_file_size_bytes {
        return Err(too_large(server.max_file_size_bytes));
    }

    let original_filename = safe_filename(&upload.filename);
    info!("Received {} ({})", original_filename, format_file_size(file_size));

    let extension = file_extension(&upload.filename).unwrap_or_default();
    let temp_file = TempAudioFile::write(&state.config.paths.temp_dir, &extension, &upload.bytes).await?;
    drop(upload);

    let engine = state.engine.clone();
    let path = temp_file.path().to_path_buf();
    let result = tokio::task::spawn_blocking(move || engine.predict_file(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {}", e)))??;
    drop(temp_file);

    let prediction = &result.prediction;
    let ai_insights = if query.insights {
        let outcome = state.insights.generate(prediction).await;
        if outcome.is_fallback() {
            warn!("Returning fallback insights for {}", prediction.label);
        }
        Some(outcome.into_insights())
    } else {
        None
    };

    let processing_time_ms = start.elapsed().as_millis() as u64;
    let label = prediction.label.as_str();
    let mut response = PredictResponse {
        prediction: label.to_string(),
        confidence: prediction.probability,
        prediction_code: prediction.class_index,
        all_probabilities: prediction.distribution.clone(),
        timestamp: Utc::now().to_rfc3339(),
        file_info: FileInfo {
            original_filename,
            file_size,
            processing_time_ms,
        },
        ai_insights,
        features: None,
        metrics: None,
        recommendations: None,
        confidence_interpretation: None,
    };

    if query.detailed {
        response.metrics = Some(PredictionMetrics {
            processing_time_ms,
            audio_duration_ms: (result.original_duration_seconds * 1000.0).round() as u64,
            feature_extraction_time_ms: result.extraction_time.as_millis() as u64,
            prediction_time_ms: result.inference_time.as_millis() as u64,
            file_size_bytes: file_size,
        });
        response.recommendations = Some(health_recommendations(label, prediction.probability));
        response.confidence_interpretation = Some(confidence_interpretation(prediction.probability).to_string());
        response.features = Some(result.features);
    }

    info!(
        "Prediction completed: {} (confidence: {:.2}%) in {}ms",
        response.prediction,
        response.confidence * 100.0,
        processing_time_ms
    );
    Ok(Json(response))
}

pub fn predict_routes(server: &ServerConfig) -> Router<AppState> {
    let body_limit = usize::try_from(server.max_file_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(body_limit))
}
