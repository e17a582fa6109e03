//! Services for brx-ai

pub mod classifier;
pub mod fallback_insights;
pub mod gemini_client;
pub mod insight_engine;
pub mod model_cache;
pub mod prediction_engine;
pub mod recommendations;
pub mod temp_files;

pub use classifier::{load_classifier, Classifier, ClassifierArtifact};
pub use fallback_insights::fallback_insights;
pub use gemini_client::{ExplanationClient, ExplanationError, GeminiClient};
pub use insight_engine::InsightEngine;
pub use model_cache::ModelCache;
pub use prediction_engine::{FilePrediction, ModelInfo, PredictionEngine, PredictionError};
pub use temp_files::{spawn_periodic_sweep, sweep_stale_files, TempAudioFile};
