//! Pretrained classifier artifact
//!
//! The artifact is a single JSON document exported from the training
//! environment:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "model_type": "RandomForestClassifier",
//!   "classes": [0, 1, 2, 3, 4, 5, 6, 7],
//!   "feature_names": ["chroma_stft_mean", "..."],
//!   "estimator": { "kind": "decision_forest", "trees": [ { "nodes": [...] } ] }
//! }
//! ```
//!
//! Every backend implements [`Classifier`]; compatibility is checked once,
//! when the artifact is loaded, never at prediction time.

use super::prediction_engine::PredictionError;
use brx_common::DiseaseLabel;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Only artifact layout this build reads
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Capabilities every classifier backend provides
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Human-readable estimator name
    fn model_type(&self) -> &str;

    /// Class codes, in probability-column order
    fn classes(&self) -> &[i64];

    /// Feature columns the estimator was trained on, in order
    fn feature_names(&self) -> &[String];

    /// One probability per class, same order as [`Classifier::classes`]
    ///
    /// `features` must hold one value per entry of `feature_names()`.
    fn predict_probabilities(&self, features: &[f64]) -> Vec<f64>;

    /// Class code with the highest probability (first one on ties)
    fn predict(&self, features: &[f64]) -> i64 {
        let probabilities = self.predict_probabilities(features);
        let best = argmax(&probabilities);
        self.classes().get(best).copied().unwrap_or(best as i64)
    }
}

/// Index of the first maximum; 0 for an empty slice
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// On-disk artifact
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    pub model_type: String,
    pub classes: Vec<i64>,
    pub feature_names: Vec<String>,
    pub estimator: EstimatorSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    DecisionForest {
        trees: Vec<TreeSpec>,
    },
    SoftmaxRegression {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        #[serde(default)]
        scaler: Option<ScalerSpec>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

/// Standardization applied before the linear scores
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerSpec {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Ensemble of axis-aligned decision trees
///
/// Class probability is the mean over trees of each reached leaf's
/// normalized class weights.
#[derive(Debug)]
pub struct DecisionForest {
    model_type: String,
    classes: Vec<i64>,
    feature_names: Vec<String>,
    trees: Vec<Vec<NodeSpec>>,
}

impl DecisionForest {
    fn leaf_distribution<'a>(nodes: &'a [NodeSpec], features: &[f64]) -> &'a [f64] {
        let mut index = 0;
        loop {
            match &nodes[index] {
                NodeSpec::Leaf { value } => return value,
                NodeSpec::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // Trees were fit on single-precision inputs
                    let x = features.get(*feature).copied().unwrap_or(f64::NAN);
                    index = if (x as f32) as f64 <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

impl Classifier for DecisionForest {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_probabilities(&self, features: &[f64]) -> Vec<f64> {
        let mut totals = vec![0.0; self.classes.len()];
        for nodes in &self.trees {
            let leaf = Self::leaf_distribution(nodes, features);
            let weight: f64 = leaf.iter().sum();
            for (total, v) in totals.iter_mut().zip(leaf) {
                *total += v / weight;
            }
        }
        let n_trees = self.trees.len() as f64;
        totals.iter_mut().for_each(|t| *t /= n_trees);
        totals
    }
}

/// Multinomial logistic regression over (optionally) standardized features
#[derive(Debug)]
pub struct SoftmaxRegression {
    model_type: String,
    classes: Vec<i64>,
    feature_names: Vec<String>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    scaler: Option<ScalerSpec>,
}

impl Classifier for SoftmaxRegression {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_probabilities(&self, features: &[f64]) -> Vec<f64> {
        let scaled: Vec<f64> = match &self.scaler {
            Some(scaler) => features
                .iter()
                .zip(scaler.mean.iter().zip(&scaler.scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            None => features.to_vec(),
        };

        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| row.iter().zip(&scaled).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        exp.into_iter().map(|e| e / total).collect()
    }
}

/// Read, validate and instantiate the artifact at `path`
///
/// # Errors
/// * `ModelNotFound` if the file does not exist or cannot be read
/// * `ModelIncompatible` if it does not parse or fails the capability check
pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, PredictionError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        debug!("Cannot read model artifact {}: {}", path.display(), e);
        PredictionError::ModelNotFound {
            path: path.to_path_buf(),
        }
    })?;

    let incompatible = |reason: String| PredictionError::ModelIncompatible {
        path: path.to_path_buf(),
        reason,
    };

    let artifact: ClassifierArtifact =
        serde_json::from_str(&content).map_err(|e| incompatible(format!("malformed artifact: {}", e)))?;
    let classifier = build_classifier(artifact).map_err(incompatible)?;

    info!(
        "Loaded {} from {} ({} classes, {} features)",
        classifier.model_type(),
        path.display(),
        classifier.classes().len(),
        classifier.feature_names().len()
    );
    Ok(classifier)
}

/// Capability check plus backend construction
///
/// Returns the reason on failure.
pub fn build_classifier(artifact: ClassifierArtifact) -> Result<Arc<dyn Classifier>, String> {
    if artifact.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(format!(
            "unsupported format_version {} (expected {})",
            artifact.format_version, ARTIFACT_FORMAT_VERSION
        ));
    }
    if artifact.classes.len() != DiseaseLabel::COUNT {
        return Err(format!(
            "artifact declares {} classes, label enumeration has {}",
            artifact.classes.len(),
            DiseaseLabel::COUNT
        ));
    }
    let mut declared = [false; DiseaseLabel::COUNT];
    for &code in &artifact.classes {
        let label = DiseaseLabel::from_index(code).map_err(|e| format!("invalid class code: {}", e))?;
        if std::mem::replace(&mut declared[label.index()], true) {
            return Err(format!("class code {} is declared more than once", code));
        }
    }
    if artifact.feature_names.is_empty() {
        return Err("artifact declares no feature names".to_string());
    }

    let n_classes = artifact.classes.len();
    let n_features = artifact.feature_names.len();

    match artifact.estimator {
        EstimatorSpec::DecisionForest { trees } => {
            if trees.is_empty() {
                return Err("decision forest has no trees".to_string());
            }
            for (t, tree) in trees.iter().enumerate() {
                validate_tree(&tree.nodes, n_classes, n_features).map_err(|e| format!("tree {}: {}", t, e))?;
            }
            Ok(Arc::new(DecisionForest {
                model_type: artifact.model_type,
                classes: artifact.classes,
                feature_names: artifact.feature_names,
                trees: trees.into_iter().map(|t| t.nodes).collect(),
            }))
        }
        EstimatorSpec::SoftmaxRegression {
            coefficients,
            intercepts,
            scaler,
        } => {
            if coefficients.len() != n_classes || intercepts.len() != n_classes {
                return Err(format!(
                    "softmax regression has {} coefficient rows and {} intercepts for {} classes",
                    coefficients.len(),
                    intercepts.len(),
                    n_classes
                ));
            }
            if let Some(row) = coefficients.iter().find(|row| row.len() != n_features) {
                return Err(format!(
                    "coefficient row has {} weights, expected {}",
                    row.len(),
                    n_features
                ));
            }
            if let Some(scaler) = &scaler {
                if scaler.mean.len() != n_features || scaler.scale.len() != n_features {
                    return Err("scaler width does not match feature count".to_string());
                }
                if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                    return Err("scaler contains a zero or non-finite scale".to_string());
                }
            }
            Ok(Arc::new(SoftmaxRegression {
                model_type: artifact.model_type,
                classes: artifact.classes,
                feature_names: artifact.feature_names,
                coefficients,
                intercepts,
                scaler,
            }))
        }
    }
}

/// Children always point forward, so every walk from the root terminates
fn validate_tree(nodes: &[NodeSpec], n_classes: usize, n_features: usize) -> Result<(), String> {
    if nodes.is_empty() {
        return Err("no nodes".to_string());
    }
    for (i, node) in nodes.iter().enumerate() {
        match node {
            NodeSpec::Split {
                feature, left, right, ..
            } => {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", i, feature, n_features));
                }
                for child in [*left, *right] {
                    if child <= i || child >= nodes.len() {
                        return Err(format!("node {} has invalid child index {}", i, child));
                    }
                }
            }
            NodeSpec::Leaf { value } => {
                if value.len() != n_classes {
                    return Err(format!("leaf {} has {} weights for {} classes", i, value.len(), n_classes));
                }
                if value.iter().any(|v| *v < 0.0 || !v.is_finite()) || value.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {} has invalid class weights", i));
                }
            }
        }
    }
    Ok(())
}
