//! Data models for brx-ai

pub mod audio_clip;
pub mod features;
pub mod insights;
pub mod prediction;

pub use audio_clip::AudioClip;
pub use features::{feature_key, FeatureFamily, FeatureMatrix, FeatureRecord, FeatureTable, RowRejected, Statistic};
pub use insights::{InsightOutcome, InsightResult, InsightStatus, Recommendations, RiskLevel};
pub use prediction::{PredictionResult, ProbabilityDistribution};
