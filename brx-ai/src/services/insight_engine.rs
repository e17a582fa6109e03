//! Insight engine
//!
//! Prefers the remote explanation service and falls back to the local
//! templates on any failure. Never returns an error: the outcome variant says
//! which path produced the explanation.

use super::fallback_insights::{fallback_insights, percent, risk_level};
use super::gemini_client::{ExplanationClient, ExplanationError, GeminiClient};
use crate::models::{InsightOutcome, InsightResult, InsightStatus, PredictionResult, Recommendations};
use brx_common::config::ExplanationConfig;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct InsightEngine {
    client: Option<Arc<dyn ExplanationClient>>,
}

impl InsightEngine {
    /// Gemini-backed engine when an API key is configured, otherwise
    /// fallback-only
    pub fn from_config(config: &ExplanationConfig) -> Self {
        let Some(api_key) = config.usable_api_key() else {
            warn!("No explanation API key configured, insights will use local fallback");
            return Self::disabled();
        };

        match GeminiClient::new(config, api_key) {
            Ok(client) => {
                info!("Explanation service initialized ({})", config.model);
                Self::with_client(Arc::new(client))
            }
            Err(e) => {
                error!("Failed to initialize explanation service: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn with_client(client: Arc<dyn ExplanationClient>) -> Self {
        Self { client: Some(client) }
    }

    /// Engine that always uses the local fallback
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Explanation for one prediction
    pub async fn generate(&self, prediction: &PredictionResult) -> InsightOutcome {
        let start = Instant::now();
        let label = prediction.label.as_str();

        let result = match &self.client {
            Some(client) => {
                info!("Generating insights for condition: {}", label);
                let prompt = build_prompt(prediction);
                match client.generate(&prompt).await {
                    Ok(text) => parse_insights(&text, label, prediction.probability),
                    Err(e) => Err(e),
                }
            }
            None => Err(ExplanationError::NotConfigured),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(mut insights) => {
                insights.processing_time_ms = elapsed_ms;
                info!("Generated insights successfully for {}", label);
                InsightOutcome::Success(insights)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Using fallback insights for {}: {}", label, reason);
                let mut insights = fallback_insights(label, prediction.probability, Some(reason.clone()));
                insights.processing_time_ms = elapsed_ms;
                InsightOutcome::Fallback { insights, reason }
            }
        }
    }
}

/// Prompt embedding the prediction and the full distribution, highest first
pub fn build_prompt(prediction: &PredictionResult) -> String {
    let label = prediction.label.as_str();
    let pct = percent(prediction.probability);
    let distribution = prediction
        .distribution
        .sorted_descending()
        .iter()
        .map(|(l, p)| format!("- {}: {}%", l, percent(*p)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"As a professional AI Medical Assistant, analyze the following prediction results:

The patient shows a high likelihood of having {label} ({pct}%). Here are the other potential conditions based on the patient's respiratory sounds:

{distribution}

Provide professional diagnostic insights that are easy to understand for laypeople. Briefly explain what {label} is, why it's likely occurring, and suggest follow-up actions such as doctor visits, additional tests, or initial home care.

Provide your response in valid JSON format with the following structure:
{{
    "summary": "Easy-to-understand summary of results",
    "condition_explanation": "Explanation of {label} condition in layman's terms",
    "confidence_interpretation": "Interpretation of {pct}% confidence level",
    "insights": [
        "Key insight based on probabilities",
        "Analysis of respiratory sound patterns",
        "Factors that may influence results"
    ],
    "recommendations": {{
        "immediate": ["Immediate actions to take"],
        "monitoring": ["Symptoms to watch for"],
        "lifestyle": ["Lifestyle recommendations"],
        "medical": ["When to see a doctor"]
    }},
    "risk_level": "LOW/MODERATE/HIGH",
    "next_steps": "Recommended next steps",
    "disclaimer": "Warning that this is not a definitive medical diagnosis"
}}

IMPORTANT:
- Use clear, easy-to-understand English
- Do not make definitive diagnoses
- Always recommend medical consultation for concerning results
- Provide reassuring yet accurate information
- Ensure output is valid JSON"#
    )
}

/// Remove a ```json / ``` wrapper around the model's answer
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    text.trim()
}

/// "condition_explanation" -> "Condition Explanation information not available"
fn placeholder(field: &str) -> String {
    let title = field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    format!("{} information not available", title)
}

fn text_field(object: &Map<String, Value>, field: &str) -> String {
    match object.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => {
            warn!("Missing required field: {}", field);
            placeholder(field)
        }
        Some(other) => other.to_string(),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    }
}

fn recommendations(object: &Map<String, Value>) -> Recommendations {
    let section = object.get("recommendations").and_then(Value::as_object);
    if section.is_none() {
        warn!("Missing required field: recommendations");
    }
    let category = |name: &str| -> Vec<String> {
        section
            .and_then(|s| s.get(name))
            .filter(|v| !v.is_null())
            .map(string_list)
            .unwrap_or_else(|| vec![format!("Consult with medical professionals for {} guidance", name)])
    };
    Recommendations {
        immediate: category("immediate"),
        monitoring: category("monitoring"),
        lifestyle: category("lifestyle"),
        medical: category("medical"),
    }
}

/// Turn the model's text answer into an explanation
///
/// Missing fields are filled with placeholders; only text that is not a
/// JSON object is an error. An unrecognised `risk_level` is replaced by the
/// rule-based one.
pub fn parse_insights(text: &str, label: &str, probability: f64) -> Result<InsightResult, ExplanationError> {
    let body = strip_code_fences(text);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse JSON from explanation service: {}", e);
        ExplanationError::UnparsableInsights(e.to_string())
    })?;
    let Value::Object(object) = value else {
        return Err(ExplanationError::UnparsableInsights(
            "expected a JSON object".to_string(),
        ));
    };

    let insights = match object.get("insights") {
        Some(value) if !value.is_null() => string_list(value),
        _ => {
            warn!("Missing required field: insights");
            vec![placeholder("insights")]
        }
    };

    let risk_level = object
        .get("risk_level")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| risk_level(label, probability));

    Ok(InsightResult {
        summary: text_field(&object, "summary"),
        condition_explanation: text_field(&object, "condition_explanation"),
        confidence_interpretation: text_field(&object, "confidence_interpretation"),
        insights,
        recommendations: recommendations(&object),
        risk_level,
        next_steps: text_field(&object, "next_steps"),
        disclaimer: text_field(&object, "disclaimer"),
        status: InsightStatus::Success,
        processing_time_ms: 0,
        error_message: None,
    })
}
