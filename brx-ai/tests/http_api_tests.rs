//! HTTP API integration tests
//!
//! Drives the full router with `oneshot`; uploads are hand-built multipart
//! bodies and the classifier is a small forest fixture on disk.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use brx_ai::extractors::RespiratoryPipeline;
use brx_ai::services::{InsightEngine, ModelCache, PredictionEngine};
use brx_ai::{build_router, AppState};
use brx_common::config::TomlConfig;
use helpers::audio_generator::{wav_bytes, AudioConfig};
use helpers::model_fixture::{healthy_forest_artifact, write_artifact};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "brx-test-boundary";

struct TestContext {
    _dir: TempDir,
    temp_dir: PathBuf,
    app: Router,
}

fn test_context(with_model: bool, configure: impl FnOnce(&mut TomlConfig)) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("uploads");
    let model_path = if with_model {
        write_artifact(dir.path(), "model.json", &healthy_forest_artifact())
    } else {
        dir.path().join("absent.json")
    };

    let mut config = TomlConfig::default();
    config.paths.temp_dir = temp_dir.clone();
    config.paths.model_path = model_path.clone();
    configure(&mut config);

    let pipeline = RespiratoryPipeline::new(&config.pipeline);
    let engine = PredictionEngine::with_cache(pipeline, Arc::new(ModelCache::new()), model_path);
    let state = AppState::with_parts(config, engine, InsightEngine::disabled());

    TestContext {
        _dir: dir,
        temp_dir,
        app: build_router(state),
    }
}

fn temp_file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn predict_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn short_wav() -> Vec<u8> {
    wav_bytes(&AudioConfig {
        duration_seconds: 1.0,
        ..AudioConfig::default()
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = test_context(true, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["model_available"], true);
    assert_eq!(json["pipeline_status"], "not_loaded");
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_health_reports_missing_model() {
    let ctx = test_context(false, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_available"], false);
}

#[tokio::test]
async fn test_diseases_endpoint() {
    let ctx = test_context(false, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/diseases")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_count"], 8);
    let names: Vec<&str> = json["diseases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names[0], "Asthma");
    assert!(names.contains(&"COPD"));
    assert!(names.contains(&"Healthy"));
}

#[tokio::test]
async fn test_pipeline_status_endpoint() {
    let ctx = test_context(true, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/pipeline/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pipeline_loaded"], false);
    assert_eq!(json["target_duration"], 7.8560090702947845);
    assert_eq!(json["excluded_features"][0], "mel_spectrogram_min");
    assert_eq!(json["steps"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let ctx = test_context(false, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_wrong_method_returns_json_405() {
    let ctx = test_context(false, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/predict")).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"]["code"], "METHOD_NOT_ALLOWED");
    assert_eq!(json["error"]["message"], "GET is not supported on /api/predict");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_model_info_endpoint() {
    let ctx = test_context(true, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/model")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_type"], "RandomForestClassifier");
    assert_eq!(json["classes_count"], 8);
    assert_eq!(json["feature_count"], 30);
    assert_eq!(json["is_compatible"], true);

    let (_, health) = send(&ctx.app, get_request("/api/health")).await;
    assert_eq!(health["pipeline_status"], "loaded");
}

#[tokio::test]
async fn test_model_info_without_model_is_unavailable() {
    let ctx = test_context(false, |_| {});
    let (status, json) = send(&ctx.app, get_request("/api/model")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "MODEL_UNAVAILABLE");
}

#[tokio::test]
async fn test_predict_requires_audio_field() {
    let ctx = test_context(true, |_| {});
    let body = multipart_body("file", "tone.wav", &short_wav());
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No audio file provided in request");
}

#[tokio::test]
async fn test_predict_rejects_empty_filename() {
    let ctx = test_context(true, |_| {});
    let body = multipart_body("audio", "", &short_wav());
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No file selected");
}

#[tokio::test]
async fn test_predict_rejects_unsupported_extension() {
    let ctx = test_context(true, |_| {});
    let body = multipart_body("audio", "notes.txt", b"hello");
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"]["message"],
        "Invalid audio file format. Please upload WAV, MP3, FLAC, M4A files."
    );
    assert_eq!(temp_file_count(&ctx.temp_dir), 0);
}

#[tokio::test]
async fn test_predict_rejects_oversized_upload() {
    let ctx = test_context(true, |config| config.server.max_file_size_bytes = 1024);
    let body = multipart_body("audio", "tone.wav", &short_wav());
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "File too large. Maximum size: 1024 bytes");
    assert_eq!(temp_file_count(&ctx.temp_dir), 0);
}

#[tokio::test]
async fn test_predict_valid_wav() {
    let ctx = test_context(true, |_| {});
    let audio = short_wav();
    let body = multipart_body("audio", "breath.wav", &audio);
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::OK, "body: {json}");
    assert_eq!(json["prediction"], "Healthy");
    assert_eq!(json["prediction_code"], 4);
    assert!((json["confidence"].as_f64().unwrap() - 0.7).abs() < 1e-9);

    let probabilities = json["all_probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), 8);
    let total: f64 = probabilities.values().map(|p| p.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-9);

    assert_eq!(json["file_info"]["original_filename"], "breath.wav");
    assert_eq!(json["file_info"]["file_size"], audio.len() as u64);
    assert!(json.get("ai_insights").is_none());
    assert!(json.get("features").is_none());

    assert_eq!(temp_file_count(&ctx.temp_dir), 0, "upload must be removed");
}

#[tokio::test]
async fn test_predict_with_insights_and_details() {
    let ctx = test_context(true, |_| {});
    let body = multipart_body("audio", "breath.wav", &short_wav());
    let (status, json) = send(&ctx.app, predict_request("/api/predict?insights=true&detailed=true", body)).await;

    assert_eq!(status, StatusCode::OK, "body: {json}");

    let insights = &json["ai_insights"];
    assert_eq!(insights["llm_status"], "fallback_used");
    assert_eq!(insights["risk_level"], "LOW");
    assert_eq!(insights["error_message"], "explanation service not configured");
    assert_eq!(insights["recommendations"]["immediate"].as_array().unwrap().len(), 2);

    assert_eq!(json["features"].as_object().unwrap().len(), 30);
    assert!(json["metrics"]["audio_duration_ms"].as_u64().unwrap() >= 999);
    assert!(!json["recommendations"].as_array().unwrap().is_empty());
    assert!(json["confidence_interpretation"].is_string());
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let ctx = test_context(false, |_| {});
    let body = multipart_body("audio", "breath.wav", &short_wav());
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json["error"]["message"],
        "Prediction model not found. Please contact system administrator."
    );
    assert_eq!(temp_file_count(&ctx.temp_dir), 0);
}

#[tokio::test]
async fn test_predict_undecodable_audio_fails_cleanly() {
    let ctx = test_context(true, |_| {});
    let body = multipart_body("audio", "broken.wav", b"RIFF garbage that is not audio");
    let (status, json) = send(&ctx.app, predict_request("/api/predict", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "PREDICTION_FAILED");
    assert_eq!(temp_file_count(&ctx.temp_dir), 0);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let ctx = test_context(false, |_| {});
    let request = Request::builder()
        .uri("/api/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}
