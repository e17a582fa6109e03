//! Prediction result returned by the prediction engine

use brx_common::DiseaseLabel;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Per-label probabilities in label-enumeration order
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityDistribution(Vec<(DiseaseLabel, f64)>);

impl ProbabilityDistribution {
    /// Pair probability column `i` with `DiseaseLabel::ALL[i]`
    ///
    /// Returns `None` unless exactly one probability per label is given.
    pub fn from_columns(probabilities: &[f64]) -> Option<Self> {
        if probabilities.len() != DiseaseLabel::COUNT {
            return None;
        }
        Some(Self(
            DiseaseLabel::ALL
                .iter()
                .copied()
                .zip(probabilities.iter().copied())
                .collect(),
        ))
    }

    pub fn get(&self, label: DiseaseLabel) -> Option<f64> {
        self.0.iter().find(|(l, _)| *l == label).map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DiseaseLabel, f64)> + '_ {
        self.0.iter().copied()
    }

    /// Entries ordered by probability, highest first (stable for ties)
    pub fn sorted_descending(&self) -> Vec<(DiseaseLabel, f64)> {
        let mut sorted = self.0.clone();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().map(|(_, p)| p).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ProbabilityDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, p) in &self.0 {
            map.serialize_entry(label.as_str(), p)?;
        }
        map.end()
    }
}

/// Outcome of classifying one feature record
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Predicted condition
    #[serde(rename = "prediction")]
    pub label: DiseaseLabel,
    /// Trained class index of `label`
    #[serde(rename = "prediction_code")]
    pub class_index: usize,
    /// Highest class probability
    pub probability: f64,
    #[serde(rename = "all_probabilities")]
    pub distribution: ProbabilityDistribution,
    pub processing_time_seconds: f64,
    /// Width of the record fed to the classifier
    pub feature_count: usize,
}
