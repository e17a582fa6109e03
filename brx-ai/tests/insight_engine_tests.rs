//! Explanation client tests against a local stub of the generateContent API

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use brx_ai::models::{InsightOutcome, InsightStatus, PredictionResult, ProbabilityDistribution, RiskLevel};
use brx_ai::services::{GeminiClient, InsightEngine};
use brx_common::config::ExplanationConfig;
use brx_common::DiseaseLabel;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum StubMode {
    /// Never answers within the client timeout
    Hang,
    Status(u16),
    /// 200 with `text` as the first candidate part
    Text(String),
}

struct Stub {
    mode: StubMode,
    attempts: AtomicUsize,
    last_request: Mutex<Option<(String, Value)>>,
}

async fn gemini_stub(State(stub): State<Arc<Stub>>, uri: Uri, body: String) -> Response {
    stub.attempts.fetch_add(1, Ordering::SeqCst);
    let payload = serde_json::from_str(&body).unwrap_or(Value::Null);
    *stub.last_request.lock().unwrap() = Some((uri.to_string(), payload));

    match &stub.mode {
        StubMode::Hang => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            StatusCode::OK.into_response()
        }
        StubMode::Status(code) => (StatusCode::from_u16(*code).unwrap(), "upstream failure").into_response(),
        StubMode::Text(text) => Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .into_response(),
    }
}

async fn start_stub(mode: StubMode) -> (SocketAddr, Arc<Stub>) {
    let stub = Arc::new(Stub {
        mode,
        attempts: AtomicUsize::new(0),
        last_request: Mutex::new(None),
    });
    let app = Router::new().fallback(gemini_stub).with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, stub)
}

fn engine_for(addr: SocketAddr) -> InsightEngine {
    let config = ExplanationConfig {
        api_key: Some("test-key".to_string()),
        base_url: format!("http://{}/v1beta/models", addr),
        ..ExplanationConfig::default()
    };
    let client = GeminiClient::new(&config, "test-key")
        .unwrap()
        .with_timeout(Duration::from_millis(300))
        .unwrap();
    InsightEngine::with_client(Arc::new(client))
}

fn copd_prediction() -> PredictionResult {
    let probabilities = [0.02, 0.01, 0.01, 0.856, 0.05, 0.02, 0.024, 0.01];
    PredictionResult {
        label: DiseaseLabel::Copd,
        class_index: DiseaseLabel::Copd.index(),
        probability: 0.856,
        distribution: ProbabilityDistribution::from_columns(&probabilities).unwrap(),
        processing_time_seconds: 0.1,
        feature_count: 30,
    }
}

fn full_explanation() -> String {
    json!({
        "summary": "Sound patterns resemble COPD",
        "condition_explanation": "COPD is a chronic lung disease",
        "confidence_interpretation": "High confidence",
        "insights": ["Wheeze-like energy", "Reduced airflow"],
        "recommendations": {
            "immediate": ["See a pulmonologist"],
            "monitoring": ["Track breathlessness"],
            "lifestyle": ["Stop smoking"],
            "medical": ["Spirometry test"]
        },
        "risk_level": "high",
        "next_steps": "Book an appointment",
        "disclaimer": "Screening only"
    })
    .to_string()
}

#[tokio::test]
async fn test_successful_explanation() {
    let (addr, stub) = start_stub(StubMode::Text(format!("```json\n{}\n```", full_explanation()))).await;
    let outcome = engine_for(addr).generate(&copd_prediction()).await;

    let InsightOutcome::Success(insights) = outcome else {
        panic!("expected remote explanation");
    };
    assert_eq!(insights.status, InsightStatus::Success);
    assert_eq!(insights.summary, "Sound patterns resemble COPD");
    assert_eq!(insights.insights.len(), 2);
    assert_eq!(insights.risk_level, RiskLevel::High);
    assert!(insights.error_message.is_none());
    assert_eq!(stub.attempts.load(Ordering::SeqCst), 1);

    let (uri, payload) = stub.last_request.lock().unwrap().clone().unwrap();
    assert!(uri.starts_with("/v1beta/models/gemini-1.5-flash:generateContent"));
    assert!(uri.contains("key=test-key"));
    let prompt = payload["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("COPD (86%)"));
    assert!(prompt.contains("- Healthy: 5%"));
    assert_eq!(payload["generationConfig"]["maxOutputTokens"], 2048);
}

#[tokio::test]
async fn test_missing_fields_get_placeholders() {
    let text = json!({
        "summary": "Partial answer",
        "recommendations": { "immediate": ["Rest"] }
    })
    .to_string();
    let (addr, _stub) = start_stub(StubMode::Text(text)).await;
    let outcome = engine_for(addr).generate(&copd_prediction()).await;

    let InsightOutcome::Success(insights) = outcome else {
        panic!("partial answers are still a success");
    };
    assert_eq!(insights.insights, vec!["Insights information not available".to_string()]);
    assert_eq!(insights.next_steps, "Next Steps information not available");
    assert_eq!(
        insights.recommendations.medical,
        vec!["Consult with medical professionals for medical guidance".to_string()]
    );
    // No risk level in the answer: rule-based value
    assert_eq!(insights.risk_level, RiskLevel::High);
}

#[tokio::test]
async fn test_unparsable_text_falls_back() {
    let (addr, stub) = start_stub(StubMode::Text("I cannot answer in JSON today".to_string())).await;
    let outcome = engine_for(addr).generate(&copd_prediction()).await;

    let InsightOutcome::Fallback { insights, reason } = outcome else {
        panic!("expected fallback");
    };
    assert!(reason.starts_with("Invalid JSON response from Gemini"));
    assert_eq!(insights.status, InsightStatus::FallbackUsed);
    assert_eq!(insights.summary, "Analysis indicates possible COPD with 86% confidence level");
    assert_eq!(insights.error_message.as_deref(), Some(reason.as_str()));
    // The HTTP exchange itself succeeded, so no retry
    assert_eq!(stub.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_retries_then_falls_back() {
    let (addr, stub) = start_stub(StubMode::Status(500)).await;
    let outcome = engine_for(addr).generate(&copd_prediction()).await;

    let InsightOutcome::Fallback { reason, .. } = outcome else {
        panic!("expected fallback");
    };
    assert_eq!(reason, "Gemini API failed with status 500");
    assert_eq!(stub.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_timeout_retries_then_falls_back() {
    let (addr, stub) = start_stub(StubMode::Hang).await;
    let outcome = engine_for(addr).generate(&copd_prediction()).await;

    let InsightOutcome::Fallback { insights, reason } = outcome else {
        panic!("expected fallback");
    };
    assert_eq!(reason, "Gemini API timeout after multiple attempts");
    assert_eq!(insights.risk_level, RiskLevel::High);
    assert_eq!(stub.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_candidates_falls_back() {
    let (addr, _stub) = start_stub(StubMode::Text(String::new())).await;
    let outcome = engine_for(addr).generate(&copd_prediction()).await;

    let InsightOutcome::Fallback { reason, .. } = outcome else {
        panic!("expected fallback");
    };
    assert!(reason.starts_with("Failed to parse Gemini response"));
}
