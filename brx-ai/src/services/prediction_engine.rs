//! Prediction engine
//!
//! Runs a feature record through the cached classifier and maps the result
//! onto the fixed label enumeration. The record's columns are checked against
//! the artifact's declared feature order before anything is predicted.

use super::classifier::{argmax, Classifier};
use super::model_cache::ModelCache;
use crate::extractors::{PipelineError, RespiratoryPipeline};
use crate::models::{FeatureRecord, PredictionResult, ProbabilityDistribution};
use brx_common::DiseaseLabel;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("Model at {} is incompatible: {reason}", path.display())]
    ModelIncompatible { path: PathBuf, reason: String },

    #[error(
        "Feature schema mismatch at column {position}: model expects '{expected}', record has '{found}' \
         ({expected_count} columns expected, {actual_count} given)"
    )]
    FeatureSchemaMismatch {
        expected_count: usize,
        actual_count: usize,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Prediction code {code} is outside the {count}-label enumeration", count = DiseaseLabel::COUNT)]
    PredictionCodeOutOfRange { code: i64 },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Summary of the loaded artifact
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub classes: Vec<i64>,
    pub classes_count: usize,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    /// Artifact feature order equals the pipeline's output order
    pub is_compatible: bool,
}

/// Prediction for one audio file plus what it took to get there
#[derive(Debug, Clone)]
pub struct FilePrediction {
    pub prediction: PredictionResult,
    pub features: FeatureRecord,
    /// Duration of the decoded clip before normalization
    pub original_duration_seconds: f64,
    pub extraction_time: Duration,
    pub inference_time: Duration,
}

pub struct PredictionEngine {
    pipeline: RespiratoryPipeline,
    cache: Arc<ModelCache>,
    model_path: PathBuf,
}

impl PredictionEngine {
    /// Engine backed by the process-wide model cache
    pub fn new(pipeline: RespiratoryPipeline, model_path: impl Into<PathBuf>) -> Self {
        Self::with_cache(pipeline, ModelCache::shared(), model_path)
    }

    pub fn with_cache(pipeline: RespiratoryPipeline, cache: Arc<ModelCache>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            cache,
            model_path: model_path.into(),
        }
    }

    pub fn pipeline(&self) -> &RespiratoryPipeline {
        &self.pipeline
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Artifact file exists (it may still fail to load)
    pub fn is_model_available(&self) -> bool {
        self.model_path.is_file()
    }

    /// Artifact has been loaded into the cache
    pub fn is_model_loaded(&self) -> bool {
        self.cache.is_loaded(&self.model_path)
    }

    /// Cached classifier, loading it on first use
    pub fn classifier(&self) -> Result<Arc<dyn Classifier>, PredictionError> {
        self.cache.get_or_load(&self.model_path)
    }

    /// Describe the artifact and whether it matches the pipeline's output
    pub fn model_info(&self) -> Result<ModelInfo, PredictionError> {
        let classifier = self.classifier()?;
        let feature_names = classifier.feature_names().to_vec();
        Ok(ModelInfo {
            model_type: classifier.model_type().to_string(),
            classes: classifier.classes().to_vec(),
            classes_count: classifier.classes().len(),
            feature_count: feature_names.len(),
            is_compatible: feature_names == self.pipeline.expected_feature_names(),
            feature_names,
        })
    }

    /// Classify one feature record
    ///
    /// # Errors
    /// * `ModelNotFound` / `ModelIncompatible` if the artifact cannot be loaded
    /// * `FeatureSchemaMismatch` if the record's columns differ from the
    ///   artifact's feature order
    /// * `PredictionCodeOutOfRange` if the predicted class code is not a label
    pub fn predict(&self, record: &FeatureRecord) -> Result<PredictionResult, PredictionError> {
        let start = Instant::now();
        let classifier = self.classifier()?;
        check_feature_schema(classifier.feature_names(), record)?;

        let probabilities = classifier.predict_probabilities(record.values());
        let best = argmax(&probabilities);
        let code = classifier
            .classes()
            .get(best)
            .copied()
            .unwrap_or(best as i64);
        let label =
            DiseaseLabel::from_index(code).map_err(|e| PredictionError::PredictionCodeOutOfRange { code: e.0 })?;

        let distribution = label_distribution(classifier.classes(), &probabilities).map_err(|reason| {
            PredictionError::ModelIncompatible {
                path: self.model_path.clone(),
                reason,
            }
        })?;
        let probability = probabilities.get(best).copied().unwrap_or(0.0);

        debug!(label = %label, probability, "Classified feature record");

        Ok(PredictionResult {
            label,
            class_index: label.index(),
            probability,
            distribution,
            processing_time_seconds: start.elapsed().as_secs_f64(),
            feature_count: record.len(),
        })
    }

    /// Decode, preprocess and classify one audio file
    ///
    /// The model is resolved before the audio is touched, so a missing
    /// artifact is reported even for unreadable audio.
    pub fn predict_file(&self, path: &Path) -> Result<FilePrediction, PredictionError> {
        let start = Instant::now();
        self.classifier()?;

        let clip = self.pipeline.load(path)?;
        let original_duration_seconds = clip.duration_seconds();
        let features = self.pipeline.transform_clip(clip)?;
        let extraction_time = start.elapsed();

        let inference_start = Instant::now();
        let mut prediction = self.predict(&features)?;
        let inference_time = inference_start.elapsed();
        prediction.processing_time_seconds = start.elapsed().as_secs_f64();

        info!(
            "Prediction for {}: {} ({:.1}% confidence) in {:.3}s",
            path.display(),
            prediction.label,
            prediction.probability * 100.0,
            prediction.processing_time_seconds
        );

        Ok(FilePrediction {
            prediction,
            features,
            original_duration_seconds,
            extraction_time,
            inference_time,
        })
    }
}

/// Key each probability column by its class code's label
///
/// Every label must be covered by exactly one column.
fn label_distribution(classes: &[i64], probabilities: &[f64]) -> Result<ProbabilityDistribution, String> {
    if classes.len() != DiseaseLabel::COUNT || probabilities.len() != classes.len() {
        return Err(format!(
            "classifier returned {} probabilities for {} classes, expected {}",
            probabilities.len(),
            classes.len(),
            DiseaseLabel::COUNT
        ));
    }

    let mut by_label: [Option<f64>; DiseaseLabel::COUNT] = [None; DiseaseLabel::COUNT];
    for (&code, &p) in classes.iter().zip(probabilities) {
        let label = DiseaseLabel::from_index(code).map_err(|e| format!("invalid class code: {}", e))?;
        if by_label[label.index()].replace(p).is_some() {
            return Err(format!("class code {} is declared more than once", code));
        }
    }

    let columns: Vec<f64> = by_label.iter().flatten().copied().collect();
    ProbabilityDistribution::from_columns(&columns)
        .ok_or_else(|| "class codes do not cover every label".to_string())
}

/// Record columns must equal the artifact's feature order exactly
pub fn check_feature_schema(expected: &[String], record: &FeatureRecord) -> Result<(), PredictionError> {
    let found = record.columns();
    let width = expected.len().max(found.len());
    for position in 0..width {
        let e = expected.get(position);
        let f = found.get(position);
        if e != f {
            return Err(PredictionError::FeatureSchemaMismatch {
                expected_count: expected.len(),
                actual_count: found.len(),
                position,
                expected: e.cloned().unwrap_or_else(|| "<none>".to_string()),
                found: f.cloned().unwrap_or_else(|| "<none>".to_string()),
            });
        }
    }
    Ok(())
}
