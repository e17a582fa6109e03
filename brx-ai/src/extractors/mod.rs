//! Audio-to-feature-record preprocessing pipeline
//!
//! Steps, in order:
//! 1. AudioLoader: decode to mono at the native sample rate
//! 2. AudioTrimmer: pad/truncate to the target duration
//! 3. FeatureExtractor: eight spectral/temporal feature families
//! 4. FeatureStatisticsCalculator: four statistics per family, minus the
//!    excluded columns
//!
//! The output layout must match what the classifier was trained on.

pub mod duration_normalizer;
pub mod feature_extractor;
pub mod feature_statistics;
pub mod spectral;

pub use duration_normalizer::DurationNormalizer;
pub use feature_extractor::FeatureExtractor;
pub use feature_statistics::FeatureStatistics;

use crate::models::{AudioClip, FeatureFamily, FeatureRecord, FeatureTable, RowRejected};
use crate::utils::decode_audio_file;
use brx_common::config::PipelineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Step names reported by the pipeline status endpoint
pub const PIPELINE_STEPS: [&str; 4] = [
    "AudioLoader",
    "AudioTrimmer",
    "FeatureExtractor",
    "FeatureStatisticsCalculator",
];

/// Errors raised while turning an audio file into a feature record
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Audio file not found: {}", path.display())]
    AudioNotFound { path: PathBuf },

    #[error("Invalid audio '{clip}': {reason}")]
    InvalidAudio { clip: String, reason: String },

    #[error("Feature extraction failed for {family} on '{clip}': {reason}")]
    FeatureExtraction {
        family: FeatureFamily,
        clip: String,
        reason: String,
    },

    #[error("Two batch inputs share the file name '{name}' ({})", path.display())]
    DuplicateClipName { name: String, path: PathBuf },

    #[error("Feature record for '{clip}' does not match the table layout")]
    LayoutMismatch { clip: String },
}

/// Configured preprocessing pipeline
#[derive(Debug, Clone)]
pub struct RespiratoryPipeline {
    normalizer: DurationNormalizer,
    extractor: FeatureExtractor,
    statistics: FeatureStatistics,
}

impl RespiratoryPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let pipeline = Self {
            normalizer: DurationNormalizer::new(config.target_duration_seconds),
            extractor: FeatureExtractor::new(config.n_mfcc),
            statistics: FeatureStatistics::new(config.excluded_features.clone()),
        };
        info!(
            "Created respiratory pipeline with {} steps (target duration {}s)",
            PIPELINE_STEPS.len(),
            config.target_duration_seconds
        );
        pipeline
    }

    pub fn steps(&self) -> &'static [&'static str] {
        &PIPELINE_STEPS
    }

    pub fn target_duration_seconds(&self) -> f64 {
        self.normalizer.target_duration_seconds()
    }

    pub fn excluded_features(&self) -> &[String] {
        self.statistics.excluded_features()
    }

    /// Column names of every record this pipeline produces
    pub fn expected_feature_names(&self) -> Vec<String> {
        self.statistics.expected_columns()
    }

    /// Decode an audio file (pipeline step 1)
    pub fn load(&self, path: &Path) -> Result<AudioClip, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::AudioNotFound {
                path: path.to_path_buf(),
            });
        }
        let clip = decode_audio_file(path)?;
        debug!(
            clip = %clip.name,
            duration = format!("{:.2}", clip.duration_seconds()),
            "Loaded audio file"
        );
        Ok(clip)
    }

    /// Normalize, extract and aggregate an already decoded clip (steps 2-4)
    pub fn transform_clip(&self, clip: AudioClip) -> Result<FeatureRecord, PipelineError> {
        let clip = self.normalizer.normalize(clip)?;
        let matrices = self.extractor.extract(&clip)?;
        self.statistics.aggregate(&clip.name, &matrices)
    }

    /// Full pipeline for one file
    pub fn transform(&self, path: &Path) -> Result<FeatureRecord, PipelineError> {
        let clip = self.load(path)?;
        self.transform_clip(clip)
    }

    /// Full pipeline for several files; rows keyed by file name
    ///
    /// Any failing file aborts the batch, as do two files sharing a name.
    pub fn transform_batch(&self, paths: &[PathBuf]) -> Result<FeatureTable, PipelineError> {
        let mut table = FeatureTable::new(self.expected_feature_names());
        for path in paths {
            let clip = self.load(path)?;
            let name = clip.name.clone();
            if table.row(&name).is_some() {
                return Err(PipelineError::DuplicateClipName {
                    name,
                    path: path.clone(),
                });
            }
            let record = self.transform_clip(clip)?;
            table.push_row(name, record).map_err(|rejected| match rejected {
                RowRejected::DuplicateName(name) => PipelineError::DuplicateClipName {
                    name,
                    path: path.clone(),
                },
                RowRejected::ColumnMismatch(clip) => PipelineError::LayoutMismatch { clip },
            })?;
        }
        info!(rows = table.len(), columns = table.columns().len(), "Feature statistics calculated");
        Ok(table)
    }
}
