//! Fixed-duration normalization
//!
//! Every clip is cut or zero-padded to `floor(target_duration * sample_rate)`
//! samples before feature extraction. Truncation keeps the head of the clip;
//! padding is appended at the end.

use super::PipelineError;
use crate::models::AudioClip;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct DurationNormalizer {
    target_duration_seconds: f64,
}

impl DurationNormalizer {
    pub fn new(target_duration_seconds: f64) -> Self {
        Self {
            target_duration_seconds,
        }
    }

    pub fn target_duration_seconds(&self) -> f64 {
        self.target_duration_seconds
    }

    /// Sample count a clip at `sample_rate` is normalized to
    pub fn target_samples(&self, sample_rate: u32) -> usize {
        (self.target_duration_seconds * sample_rate as f64).floor() as usize
    }

    /// Pad or truncate the clip to the target sample count
    ///
    /// An empty clip becomes all zeros. A zero sample rate is rejected.
    pub fn normalize(&self, mut clip: AudioClip) -> Result<AudioClip, PipelineError> {
        if clip.sample_rate == 0 {
            return Err(PipelineError::InvalidAudio {
                clip: clip.name,
                reason: "sample rate is 0".to_string(),
            });
        }

        let target = self.target_samples(clip.sample_rate);
        let original = clip.samples.len();
        clip.samples.resize(target, 0.0);

        debug!(
            clip = %clip.name,
            original_samples = original,
            target_samples = target,
            "Normalized clip duration"
        );

        Ok(clip)
    }
}
