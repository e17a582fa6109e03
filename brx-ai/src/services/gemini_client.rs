//! Gemini generateContent client
//!
//! One prompt in, the first candidate's text out. Every attempt is a full,
//! independent POST; the error of the last attempt is the one reported.

use async_trait::async_trait;
use brx_common::config::ExplanationConfig;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("brx-ai/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ExplanationError {
    #[error("explanation service not configured")]
    NotConfigured,

    #[error("Gemini API timeout after multiple attempts")]
    Timeout { attempts: u32 },

    #[error("Gemini API failed with status {status}")]
    Status { status: u16, body: String },

    #[error("Gemini API failed: {0}")]
    Transport(String),

    #[error("Failed to parse Gemini response: {0}")]
    MalformedEnvelope(String),

    #[error("Invalid JSON response from Gemini: {0}")]
    UnparsableInsights(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Remote text generation used for explanations
#[async_trait]
pub trait ExplanationClient: Send + Sync {
    /// Generated text for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, ExplanationError>;
}

/// Google Gemini REST client
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_attempts: u32,
    generation_config: Value,
}

impl GeminiClient {
    pub fn new(config: &ExplanationConfig, api_key: impl Into<String>) -> Result<Self, ExplanationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ExplanationError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            endpoint: format!(
                "{}/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            max_attempts: config.max_attempts.max(1),
            generation_config: json!({
                "temperature": config.temperature,
                "topK": config.top_k,
                "topP": config.top_p,
                "maxOutputTokens": config.max_output_tokens,
            }),
        })
    }

    /// Replace the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ExplanationError> {
        self.http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ExplanationError::ClientBuild(e.to_string()))?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": self.generation_config,
        })
    }

    /// POST the prompt until one attempt returns 200 with a JSON body
    async fn call_api(&self, prompt: &str) -> Result<Value, ExplanationError> {
        let payload = self.payload(prompt);
        let mut last_error = ExplanationError::Transport("no attempt made".to_string());

        for attempt in 1..=self.max_attempts {
            info!("Calling Gemini API (attempt {})", attempt);

            let response = self
                .http_client
                .post(&self.endpoint)
                .query(&[("key", self.api_key.as_str())])
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!("Gemini API timeout (attempt {})", attempt);
                    last_error = ExplanationError::Timeout { attempts: attempt };
                    continue;
                }
                Err(e) => {
                    warn!("Gemini API error (attempt {}): {}", attempt, e);
                    last_error = ExplanationError::Transport(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                warn!("Gemini API returned status {}: {}", status.as_u16(), body);
                last_error = ExplanationError::Status {
                    status: status.as_u16(),
                    body,
                };
                continue;
            }

            match response.json::<Value>().await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_timeout() => {
                    warn!("Gemini API timeout reading body (attempt {})", attempt);
                    last_error = ExplanationError::Timeout { attempts: attempt };
                }
                Err(e) => {
                    warn!("Gemini API returned a non-JSON body (attempt {}): {}", attempt, e);
                    last_error = ExplanationError::Transport(e.to_string());
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl ExplanationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ExplanationError> {
        let envelope = self.call_api(prompt).await?;
        let text = candidate_text(&envelope)?;
        debug!("Raw Gemini response: {}", text);
        Ok(text.to_string())
    }
}

/// Text of the first part of the first candidate
pub fn candidate_text(envelope: &Value) -> Result<&str, ExplanationError> {
    let candidate = envelope
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| ExplanationError::MalformedEnvelope("No candidates in Gemini response".to_string()))?;

    let part = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .and_then(|p| p.first())
        .ok_or_else(|| ExplanationError::MalformedEnvelope("No parts in Gemini response".to_string()))?;

    match part.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(ExplanationError::MalformedEnvelope("No text in Gemini response".to_string())),
    }
}
