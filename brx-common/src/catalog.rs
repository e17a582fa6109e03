//! Disease labels and the static disease catalog
//!
//! The label order is the classifier's trained class order. Index `i` of a
//! probability vector belongs to `DiseaseLabel::ALL[i]`; never re-sort it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Respiratory condition predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseLabel {
    Asthma,
    Bronchiectasis,
    Bronchiolitis,
    #[serde(rename = "COPD")]
    Copd,
    Healthy,
    #[serde(rename = "LRTI")]
    Lrti,
    Pneumonia,
    #[serde(rename = "URTI")]
    Urti,
}

/// A class index outside the label enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("class index {0} is outside the {count}-label enumeration", count = DiseaseLabel::COUNT)]
pub struct LabelOutOfRange(pub i64);

impl DiseaseLabel {
    /// Number of labels known to the classifier
    pub const COUNT: usize = 8;

    /// All labels in trained class-index order
    pub const ALL: [DiseaseLabel; Self::COUNT] = [
        DiseaseLabel::Asthma,
        DiseaseLabel::Bronchiectasis,
        DiseaseLabel::Bronchiolitis,
        DiseaseLabel::Copd,
        DiseaseLabel::Healthy,
        DiseaseLabel::Lrti,
        DiseaseLabel::Pneumonia,
        DiseaseLabel::Urti,
    ];

    /// Map a class index to its label
    pub fn from_index(index: i64) -> Result<Self, LabelOutOfRange> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(LabelOutOfRange(index))
    }

    /// Class index of this label
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name, identical to the training-time label string
    pub fn as_str(self) -> &'static str {
        match self {
            DiseaseLabel::Asthma => "Asthma",
            DiseaseLabel::Bronchiectasis => "Bronchiectasis",
            DiseaseLabel::Bronchiolitis => "Bronchiolitis",
            DiseaseLabel::Copd => "COPD",
            DiseaseLabel::Healthy => "Healthy",
            DiseaseLabel::Lrti => "LRTI",
            DiseaseLabel::Pneumonia => "Pneumonia",
            DiseaseLabel::Urti => "URTI",
        }
    }
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiseaseLabel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown disease label: {}", s)))
    }
}

/// Catalog entry describing a detectable condition
#[derive(Debug, Clone, Serialize)]
pub struct DiseaseInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub symptoms: &'static [&'static str],
    pub severity: &'static str,
}

/// Static catalog, one entry per label in class-index order
pub fn disease_catalog() -> Vec<DiseaseInfo> {
    DiseaseLabel::ALL.iter().map(|&label| disease_info(label)).collect()
}

/// Catalog entry for a single label
pub fn disease_info(label: DiseaseLabel) -> DiseaseInfo {
    let (description, symptoms, severity): (&str, &[&str], &str) = match label {
        DiseaseLabel::Asthma => (
            "A respiratory condition where airways narrow and swell, producing extra mucus.",
            &["Shortness of breath", "Chest tightness", "Wheezing", "Coughing"],
            "Moderate",
        ),
        DiseaseLabel::Bronchiectasis => (
            "A condition where the bronchi are abnormally widened and thickened.",
            &["Persistent cough", "Daily sputum production", "Shortness of breath"],
            "Severe",
        ),
        DiseaseLabel::Bronchiolitis => (
            "Inflammation of the small airways in the lungs.",
            &["Cough", "Wheezing", "Shortness of breath", "Fever"],
            "Mild to Moderate",
        ),
        DiseaseLabel::Copd => (
            "Chronic Obstructive Pulmonary Disease - progressive lung disease.",
            &["Chronic cough", "Shortness of breath", "Excessive mucus"],
            "Severe",
        ),
        DiseaseLabel::Healthy => (
            "Normal respiratory function with no detected abnormalities.",
            &["None"],
            "None",
        ),
        DiseaseLabel::Lrti => (
            "Lower Respiratory Tract Infection affecting lungs and airways.",
            &["Productive cough", "Fever", "Shortness of breath"],
            "Moderate",
        ),
        DiseaseLabel::Pneumonia => (
            "Infection that inflames air sacs in one or both lungs.",
            &["Cough with phlegm", "Fever", "Chills", "Difficulty breathing"],
            "Severe",
        ),
        DiseaseLabel::Urti => (
            "Upper Respiratory Tract Infection affecting nose, throat, and sinuses.",
            &["Runny nose", "Sore throat", "Cough", "Sneezing"],
            "Mild",
        ),
    };

    DiseaseInfo {
        name: label.as_str(),
        description,
        symptoms,
        severity,
    }
}
