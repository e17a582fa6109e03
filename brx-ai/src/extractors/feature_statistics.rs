//! Feature statistics aggregation
//!
//! Reduces each family's matrix to (mean, std, max, min) over all cells and
//! drops the excluded columns.

use super::PipelineError;
use crate::models::{feature_key, FeatureFamily, FeatureMatrix, FeatureRecord, Statistic};
use ndarray::Array2;
use tracing::debug;

/// Mean, population standard deviation, max and min of every cell
///
/// Empty matrices and non-finite cells are rejected so that no statistic
/// silently turns into NaN.
pub fn matrix_statistics(data: &Array2<f64>) -> Result<[f64; 4], String> {
    if data.is_empty() {
        return Err("feature matrix is empty".to_string());
    }
    if let Some(bad) = data.iter().find(|v| !v.is_finite()) {
        return Err(format!("feature matrix contains non-finite value {}", bad));
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    Ok([mean, variance.sqrt(), max, min])
}

#[derive(Debug, Clone)]
pub struct FeatureStatistics {
    excluded_features: Vec<String>,
}

impl FeatureStatistics {
    pub fn new(excluded_features: Vec<String>) -> Self {
        Self { excluded_features }
    }

    pub fn excluded_features(&self) -> &[String] {
        &self.excluded_features
    }

    /// Column layout of every record this aggregator produces
    pub fn expected_columns(&self) -> Vec<String> {
        FeatureFamily::ALL
            .iter()
            .flat_map(|&family| Statistic::ALL.iter().map(move |&stat| feature_key(family, stat)))
            .filter(|key| !self.excluded_features.contains(key))
            .collect()
    }

    /// Build the record for one clip from its matrices (in extraction order)
    pub fn aggregate(&self, clip: &str, matrices: &[FeatureMatrix]) -> Result<FeatureRecord, PipelineError> {
        let mut record = FeatureRecord::new();
        for matrix in matrices {
            let values = matrix_statistics(matrix.data()).map_err(|reason| PipelineError::FeatureExtraction {
                family: matrix.family(),
                clip: clip.to_string(),
                reason,
            })?;
            for (stat, value) in Statistic::ALL.iter().zip(values) {
                record.push(feature_key(matrix.family(), *stat), value);
            }
        }

        for name in &self.excluded_features {
            if record.remove(name).is_some() {
                debug!("Excluded feature: {}", name);
            }
        }
        Ok(record)
    }
}
