//! Layperson-readable explanation of a prediction
//!
//! Remote and locally generated explanations share one shape; callers tell
//! them apart only through `status` (or the `InsightOutcome` variant).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MODERATE" => Ok(RiskLevel::Moderate),
            "HIGH" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// Recommendations grouped into the four required categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub immediate: Vec<String>,
    pub monitoring: Vec<String>,
    pub lifestyle: Vec<String>,
    pub medical: Vec<String>,
}

impl Recommendations {
    /// Category names in output order
    pub const CATEGORIES: [&'static str; 4] = ["immediate", "monitoring", "lifestyle", "medical"];
}

/// Which path produced an explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Success,
    FallbackUsed,
}

/// Explanation returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct InsightResult {
    pub summary: String,
    pub condition_explanation: String,
    pub confidence_interpretation: String,
    pub insights: Vec<String>,
    pub recommendations: Recommendations,
    pub risk_level: RiskLevel,
    pub next_steps: String,
    pub disclaimer: String,
    #[serde(rename = "llm_status")]
    pub status: InsightStatus,
    pub processing_time_ms: u64,
    /// Why the remote explanation was not used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Result of one insight request
#[derive(Debug, Clone)]
pub enum InsightOutcome {
    /// The explanation service answered with a usable explanation
    Success(InsightResult),
    /// Deterministic local explanation; `reason` is the service failure
    Fallback { insights: InsightResult, reason: String },
}

impl InsightOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, InsightOutcome::Fallback { .. })
    }

    pub fn insights(&self) -> &InsightResult {
        match self {
            InsightOutcome::Success(insights) => insights,
            InsightOutcome::Fallback { insights, .. } => insights,
        }
    }

    pub fn into_insights(self) -> InsightResult {
        match self {
            InsightOutcome::Success(insights) => insights,
            InsightOutcome::Fallback { insights, .. } => insights,
        }
    }
}
