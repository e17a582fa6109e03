//! Classifier artifact fixtures

use brx_common::config::PipelineConfig;
use brx_ai::extractors::RespiratoryPipeline;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Column order produced by the default pipeline
pub fn default_feature_names() -> Vec<String> {
    RespiratoryPipeline::new(&PipelineConfig::default()).expected_feature_names()
}

/// Forest whose only tree always lands on a Healthy-leaning leaf
///
/// Probabilities: Healthy 0.7, Asthma/Pneumonia/URTI 0.1 each.
pub fn healthy_forest_artifact() -> Value {
    json!({
        "format_version": 1,
        "model_type": "RandomForestClassifier",
        "classes": [0, 1, 2, 3, 4, 5, 6, 7],
        "feature_names": default_feature_names(),
        "estimator": {
            "kind": "decision_forest",
            "trees": [
                { "nodes": [
                    { "kind": "split", "feature": 0, "threshold": 1.0e9, "left": 1, "right": 2 },
                    { "kind": "leaf", "value": [1.0, 0.0, 0.0, 0.0, 7.0, 0.0, 1.0, 1.0] },
                    { "kind": "leaf", "value": [0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0] }
                ]}
            ]
        }
    })
}

/// Write an artifact to `dir/name`
pub fn write_artifact(dir: &Path, name: &str, artifact: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(artifact).expect("serialize artifact"))
        .expect("write artifact");
    path
}
