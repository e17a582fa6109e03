//! Per-family feature extraction
//!
//! Produces the eight feature matrices for one normalized clip, in extraction
//! order. The STFT is computed once on first use and shared by every
//! spectral family. A failure in any family aborts the whole clip.

use super::spectral::{self, SpectralError, Spectrogram};
use super::PipelineError;
use crate::models::{AudioClip, FeatureFamily, FeatureMatrix};
use ndarray::Array2;
use once_cell::unsync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    n_mfcc: usize,
}

impl FeatureExtractor {
    pub fn new(n_mfcc: usize) -> Self {
        Self { n_mfcc }
    }

    pub fn n_mfcc(&self) -> usize {
        self.n_mfcc
    }

    /// Compute all families for one clip
    pub fn extract(&self, clip: &AudioClip) -> Result<Vec<FeatureMatrix>, PipelineError> {
        let spectrogram = OnceCell::new();
        let mut matrices = Vec::with_capacity(FeatureFamily::ALL.len());

        for family in FeatureFamily::ALL {
            let data = self
                .compute(family, clip, &spectrogram)
                .map_err(|e| PipelineError::FeatureExtraction {
                    family,
                    clip: clip.name.clone(),
                    reason: e.to_string(),
                })?;
            debug!(clip = %clip.name, %family, shape = ?data.dim(), "Extracted feature family");
            matrices.push(FeatureMatrix::new(family, data));
        }

        Ok(matrices)
    }

    fn compute(
        &self,
        family: FeatureFamily,
        clip: &AudioClip,
        spectrogram: &OnceCell<Spectrogram>,
    ) -> Result<Array2<f64>, SpectralError> {
        let spec = || spectrogram.get_or_try_init(|| Spectrogram::compute(&clip.samples, clip.sample_rate));

        match family {
            FeatureFamily::ChromaStft => Ok(spectral::chroma_stft(spec()?)),
            FeatureFamily::Mfcc => Ok(spectral::mfcc(spec()?, self.n_mfcc)),
            FeatureFamily::MelSpectrogram => Ok(spectral::melspectrogram(spec()?)),
            FeatureFamily::SpectralContrast => spectral::spectral_contrast(spec()?),
            FeatureFamily::SpectralCentroid => Ok(spectral::spectral_centroid(spec()?)),
            FeatureFamily::SpectralBandwidth => Ok(spectral::spectral_bandwidth(spec()?)),
            FeatureFamily::SpectralRolloff => Ok(spectral::spectral_rolloff(spec()?)),
            FeatureFamily::ZeroCrossingRate => spectral::zero_crossing_rate(&clip.samples),
        }
    }
}
