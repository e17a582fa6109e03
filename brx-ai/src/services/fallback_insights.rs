//! Deterministic local explanations
//!
//! Used whenever the explanation service is unavailable or returns unusable
//! output. Output depends only on the label and probability.

use crate::models::{InsightResult, InsightStatus, Recommendations, RiskLevel};

/// How quickly a condition needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Moderate,
    High,
}

/// Static per-label explanation metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionMetadata {
    pub description: &'static str,
    pub severity: &'static str,
    pub urgency: Urgency,
}

/// Metadata for a label name; unknown names get a generic entry
pub fn condition_metadata(label: &str) -> ConditionMetadata {
    let (description, severity, urgency) = match label {
        "Asthma" => (
            "condition where airways narrow and swell, producing extra mucus",
            "Moderate",
            Urgency::Moderate,
        ),
        "Bronchiectasis" => (
            "condition where bronchi are abnormally widened and thickened",
            "Severe",
            Urgency::High,
        ),
        "Bronchiolitis" => (
            "inflammation of the small airways in the lungs",
            "Mild to Moderate",
            Urgency::Moderate,
        ),
        "COPD" => (
            "chronic obstructive pulmonary disease that is progressive",
            "Severe",
            Urgency::High,
        ),
        "Healthy" => (
            "normal respiratory function with no detected abnormalities",
            "Normal",
            Urgency::Low,
        ),
        "LRTI" => (
            "lower respiratory tract infection affecting lungs and airways",
            "Moderate",
            Urgency::Moderate,
        ),
        "Pneumonia" => (
            "infection that inflames air sacs in one or both lungs",
            "Severe",
            Urgency::High,
        ),
        "URTI" => (
            "upper respiratory tract infection affecting nose, throat, and sinuses",
            "Mild",
            Urgency::Low,
        ),
        _ => (
            "respiratory condition detected by the system",
            "Requires evaluation",
            Urgency::Moderate,
        ),
    };
    ConditionMetadata {
        description,
        severity,
        urgency,
    }
}

/// Healthy is always LOW; otherwise HIGH needs p > 0.7 and high urgency,
/// MODERATE needs p >= 0.5
pub fn risk_level(label: &str, probability: f64) -> RiskLevel {
    if label == "Healthy" {
        RiskLevel::Low
    } else if probability > 0.7 && condition_metadata(label).urgency == Urgency::High {
        RiskLevel::High
    } else if probability >= 0.5 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Whole-number percentage, e.g. 0.856 -> "86"
pub fn percent(probability: f64) -> String {
    format!("{:.0}", probability * 100.0)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Explanation built from templates
///
/// `processing_time_ms` is left at 0 for the caller to fill in.
pub fn fallback_insights(label: &str, probability: f64, error_message: Option<String>) -> InsightResult {
    let metadata = condition_metadata(label);
    let pct = percent(probability);
    let strength = if probability > 0.7 {
        "strong indication"
    } else if probability > 0.5 {
        "moderate possibility"
    } else {
        "weak indication"
    };

    InsightResult {
        summary: format!("Analysis indicates possible {} with {}% confidence level", label, pct),
        condition_explanation: format!("{} is {}", label, metadata.description),
        confidence_interpretation: format!("Confidence level of {}% indicates {}", pct, strength),
        insights: vec![
            format!("System detected sound patterns consistent with {}", label),
            format!("Confidence level of {}% based on audio feature analysis", pct),
            "This result serves as initial screening, not a definitive medical diagnosis".to_string(),
        ],
        recommendations: Recommendations {
            immediate: strings(&[
                "Consult with a doctor for further evaluation",
                "Document any symptoms you are currently experiencing",
            ]),
            monitoring: strings(&[
                "Watch for changes in breathing patterns",
                "Monitor symptoms such as shortness of breath or coughing",
            ]),
            lifestyle: strings(&[
                "Avoid cigarette smoke and air pollutants",
                "Maintain good hand hygiene and clean environment",
            ]),
            medical: strings(&[
                "See a doctor immediately if symptoms worsen",
                "Undergo routine examinations as recommended by medical professionals",
            ]),
        },
        risk_level: risk_level(label, probability),
        next_steps: "Consult with medical professionals for accurate diagnosis".to_string(),
        disclaimer: "This result is an initial screening using AI. Medical consultation is still required \
                     for proper diagnosis and treatment."
            .to_string(),
        status: InsightStatus::FallbackUsed,
        processing_time_ms: 0,
        error_message,
    }
}
