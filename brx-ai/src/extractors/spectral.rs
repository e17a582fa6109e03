//! Short-time spectral transforms
//!
//! Numerically follows librosa 0.10 defaults, which the classifier's training
//! features were produced with:
//! - STFT: 2048-point FFT, hop 512, periodic Hann window, centred frames with
//!   1024 zeros of padding on each side
//! - Mel: 128 Slaney-scale bands over [0, sr/2], Slaney area normalization
//! - dB: `10·log10(max(S, 1e-10))`, floored at 80 dB below the peak
//! - Chroma: 12 bins, tuning estimated from parabolic-interpolated peaks
//!
//! All matrices are (bins × frames).

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use thiserror::Error;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;
pub const N_CHROMA: usize = 12;

const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;

/// Normalization floor for per-column norms (smallest positive f32)
const TINY: f64 = f32::MIN_POSITIVE as f64;

// Slaney mel scale
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

// Tuning estimation
const PIP_FMIN: f64 = 150.0;
const PIP_FMAX: f64 = 4000.0;
const PIP_THRESHOLD: f64 = 0.1;
const TUNING_RESOLUTION_BINS: usize = 100;

// Spectral contrast
const CONTRAST_FMIN: f64 = 200.0;
const CONTRAST_BANDS: usize = 6;
const CONTRAST_QUANTILE: f64 = 0.02;

const ROLL_PERCENT: f64 = 0.85;

const ZCR_FRAME_LENGTH: usize = 2048;
const ZCR_THRESHOLD: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectralError {
    #[error("audio buffer contains non-finite samples")]
    NonFinite,

    #[error("audio buffer is empty")]
    EmptySignal,

    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("frequency band edge {edge_hz} Hz exceeds the Nyquist frequency {nyquist_hz} Hz")]
    BandAboveNyquist { edge_hz: f64, nyquist_hz: f64 },

    #[error("frequency band {band} contains no FFT bins")]
    EmptyBand { band: usize },
}

/// STFT magnitude and power of one clip
#[derive(Debug, Clone)]
pub struct Spectrogram {
    magnitude: Array2<f64>,
    power: Array2<f64>,
    sample_rate: u32,
}

impl Spectrogram {
    /// Centred, zero-padded STFT of `samples`
    pub fn compute(samples: &[f32], sample_rate: u32) -> Result<Self, SpectralError> {
        if sample_rate == 0 {
            return Err(SpectralError::ZeroSampleRate);
        }
        ensure_finite(samples)?;

        let pad = N_FFT / 2;
        let mut padded = vec![0.0f64; samples.len() + 2 * pad];
        for (dst, &src) in padded[pad..pad + samples.len()].iter_mut().zip(samples) {
            *dst = src as f64;
        }

        let n_bins = N_FFT / 2 + 1;
        let n_frames = 1 + samples.len() / HOP_LENGTH;
        let window = hann_window(N_FFT);
        let fft = FftPlanner::<f64>::new().plan_fft_forward(N_FFT);

        let mut magnitude = Array2::<f64>::zeros((n_bins, n_frames));
        let mut power = Array2::<f64>::zeros((n_bins, n_frames));
        let mut buffer = vec![Complex::new(0.0, 0.0); N_FFT];

        for t in 0..n_frames {
            let frame = &padded[t * HOP_LENGTH..t * HOP_LENGTH + N_FFT];
            for ((slot, &x), &w) in buffer.iter_mut().zip(frame).zip(&window) {
                *slot = Complex::new(x * w, 0.0);
            }
            fft.process(&mut buffer);
            for k in 0..n_bins {
                magnitude[[k, t]] = buffer[k].norm();
                power[[k, t]] = buffer[k].norm_sqr();
            }
        }

        Ok(Self {
            magnitude,
            power,
            sample_rate,
        })
    }

    /// |STFT|
    pub fn magnitude(&self) -> &Array2<f64> {
        &self.magnitude
    }

    /// |STFT|²
    pub fn power(&self) -> &Array2<f64> {
        &self.power
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn n_frames(&self) -> usize {
        self.magnitude.ncols()
    }

    /// Centre frequency of each FFT bin
    pub fn frequencies(&self) -> Vec<f64> {
        fft_frequencies(self.sample_rate as f64, N_FFT)
    }
}

fn ensure_finite(samples: &[f32]) -> Result<(), SpectralError> {
    if samples.iter().all(|s| s.is_finite()) {
        Ok(())
    } else {
        Err(SpectralError::NonFinite)
    }
}

/// Periodic Hann window
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
        .collect()
}

/// `num` evenly spaced values over [start, stop], endpoint included
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            values[num - 1] = stop;
            values
        }
    }
}

pub fn fft_frequencies(sample_rate: f64, n_fft: usize) -> Vec<f64> {
    linspace(0.0, sample_rate / 2.0, 1 + n_fft / 2)
}

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filter bank, (n_mels × (1 + n_fft/2))
pub fn mel_filterbank(sample_rate: f64, n_fft: usize, n_mels: usize) -> Array2<f64> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let mel_f: Vec<f64> = linspace(hz_to_mel(0.0), hz_to_mel(sample_rate / 2.0), n_mels + 2)
        .into_iter()
        .map(mel_to_hz)
        .collect();
    let fdiff: Vec<f64> = mel_f.windows(2).map(|w| w[1] - w[0]).collect();

    let mut weights = Array2::<f64>::zeros((n_mels, fft_freqs.len()));
    for i in 0..n_mels {
        let enorm = 2.0 / (mel_f[i + 2] - mel_f[i]);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let lower = -(mel_f[i] - f) / fdiff[i];
            let upper = (mel_f[i + 2] - f) / fdiff[i + 1];
            weights[[i, k]] = 0.0f64.max(lower.min(upper)) * enorm;
        }
    }
    weights
}

/// Power to decibels, ref 1.0, floored at `max - 80 dB`
pub fn power_to_db(s: &Array2<f64>) -> Array2<f64> {
    let mut db = s.mapv(|v| 10.0 * v.max(AMIN).log10());
    let peak = db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - TOP_DB;
    db.mapv_inplace(|v| v.max(floor));
    db
}

/// 128-band mel power spectrogram
pub fn melspectrogram(spec: &Spectrogram) -> Array2<f64> {
    mel_filterbank(spec.sample_rate as f64, N_FFT, N_MELS).dot(spec.power())
}

/// Orthonormal DCT-II along the rows, keeping the first `n_out` coefficients
fn dct_ortho(x: &Array2<f64>, n_out: usize) -> Array2<f64> {
    let n = x.nrows();
    let n_out = n_out.min(n);
    let mut basis = Array2::<f64>::zeros((n_out, n));
    for k in 0..n_out {
        let scale = if k == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        };
        for i in 0..n {
            let angle = std::f64::consts::PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64;
            basis[[k, i]] = scale * angle.cos();
        }
    }
    basis.dot(x)
}

/// MFCCs of the dB-scaled mel spectrogram
pub fn mfcc(spec: &Spectrogram, n_mfcc: usize) -> Array2<f64> {
    dct_ortho(&power_to_db(&melspectrogram(spec)), n_mfcc)
}

/// Mean of sorted values, NaN for an empty slice
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Interpolated spectral peaks of a power spectrogram, flattened
///
/// Returns (pitch Hz, magnitude) for every local maximum above 10% of its
/// frame's peak within [150 Hz, min(4 kHz, sr/2)).
fn piptrack(power: &Array2<f64>, sample_rate: f64) -> Vec<(f64, f64)> {
    let (n_bins, n_frames) = power.dim();
    if n_bins < 2 {
        return Vec::new();
    }
    let n_fft = 2 * (n_bins - 1);
    let freqs = fft_frequencies(sample_rate, n_fft);
    let fmax = PIP_FMAX.min(sample_rate / 2.0);

    let mut peaks = Vec::new();
    let mut gated = vec![0.0f64; n_bins];

    for t in 0..n_frames {
        let col = power.column(t);
        let ref_value = PIP_THRESHOLD * col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (g, &v) in gated.iter_mut().zip(col.iter()) {
            *g = if v > ref_value { v } else { 0.0 };
        }

        for k in 0..n_bins {
            if !(PIP_FMIN <= freqs[k] && freqs[k] < fmax) {
                continue;
            }
            let prev = gated[k.saturating_sub(1)];
            let next = gated[(k + 1).min(n_bins - 1)];
            if !(gated[k] > prev && gated[k] >= next) {
                continue;
            }

            let shift = if k == 0 || k == n_bins - 1 {
                0.0
            } else {
                let a = col[k + 1] + col[k - 1] - 2.0 * col[k];
                let b = (col[k + 1] - col[k - 1]) / 2.0;
                if b.abs() >= a.abs() {
                    0.0
                } else {
                    -b / a
                }
            };
            let gradient = if k == 0 {
                col[1] - col[0]
            } else if k == n_bins - 1 {
                col[k] - col[k - 1]
            } else {
                (col[k + 1] - col[k - 1]) / 2.0
            };

            let pitch = (k as f64 + shift) * sample_rate / n_fft as f64;
            let magnitude = col[k] + 0.5 * gradient * shift;
            peaks.push((pitch, magnitude));
        }
    }
    peaks
}

/// Most common deviation (in fractions of a chroma bin) from A440 tuning
///
/// Histogram of 0.01-bin resolution over [-0.5, 0.5); 0.0 for no input.
pub fn pitch_tuning(frequencies: &[f64]) -> f64 {
    let bins_per_octave = N_CHROMA as f64;
    let residuals: Vec<f64> = frequencies
        .iter()
        .filter(|&&f| f > 0.0)
        .map(|&f| {
            let r = (bins_per_octave * (f / 27.5).log2()).rem_euclid(1.0);
            if r >= 0.5 {
                r - 1.0
            } else {
                r
            }
        })
        .collect();
    if residuals.is_empty() {
        return 0.0;
    }

    let n = TUNING_RESOLUTION_BINS;
    let edges = linspace(-0.5, 0.5, n + 1);
    let (first, last) = (edges[0], edges[n]);
    let norm = n as f64 / (last - first);

    let mut counts = vec![0usize; n];
    for r in residuals {
        if !(first..=last).contains(&r) {
            continue;
        }
        let mut idx = (((r - first) * norm) as usize).min(n - 1);
        if r < edges[idx] {
            idx = idx.saturating_sub(1);
        } else if r >= edges[idx + 1] && idx != n - 1 {
            idx += 1;
        }
        counts[idx] += 1;
    }

    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    edges[best]
}

/// Tuning offset of a power spectrogram, in fractions of a chroma bin
pub fn estimate_tuning(power: &Array2<f64>, sample_rate: f64) -> f64 {
    let peaks = piptrack(power, sample_rate);
    let mut voiced: Vec<f64> = peaks.iter().filter(|(p, _)| *p > 0.0).map(|(_, m)| *m).collect();
    let threshold = if voiced.is_empty() { 0.0 } else { median(&mut voiced) };

    let pitches: Vec<f64> = peaks
        .iter()
        .filter(|(p, m)| *p > 0.0 && *m >= threshold)
        .map(|(p, _)| *p)
        .collect();
    pitch_tuning(&pitches)
}

/// Chroma filter bank, (12 × (1 + n_fft/2)), rows starting at C
pub fn chroma_filterbank(sample_rate: f64, n_fft: usize, tuning: f64) -> Array2<f64> {
    let n_chroma = N_CHROMA as f64;
    let a440 = 440.0 * 2f64.powf(tuning / n_chroma);
    let step = sample_rate / n_fft as f64;

    let mut frqbins = Vec::with_capacity(n_fft);
    let octs: Vec<f64> = (1..n_fft)
        .map(|k| n_chroma * (k as f64 * step / (a440 / 16.0)).log2())
        .collect();
    frqbins.push(octs[0] - 1.5 * n_chroma);
    frqbins.extend(octs);

    let mut binwidth: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidth.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut wts = Array2::<f64>::zeros((N_CHROMA, n_fft));
    for c in 0..N_CHROMA {
        for (j, &fb) in frqbins.iter().enumerate() {
            let d = (fb - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            wts[[c, j]] = (-0.5 * (2.0 * d / binwidth[j]).powi(2)).exp();
        }
    }

    for (j, mut column) in wts.columns_mut().into_iter().enumerate() {
        let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm < f64::MIN_POSITIVE { 1.0 } else { norm };
        let octave_weight = (-0.5 * ((frqbins[j] / n_chroma - 5.0) / 2.0).powi(2)).exp();
        column.mapv_inplace(|v| v / norm * octave_weight);
    }

    let n_bins = 1 + n_fft / 2;
    let mut rolled = Array2::<f64>::zeros((N_CHROMA, n_bins));
    for r in 0..N_CHROMA {
        let src = (r + 3) % N_CHROMA;
        for j in 0..n_bins {
            rolled[[r, j]] = wts[[src, j]];
        }
    }
    rolled
}

/// 12-bin chromagram, each frame scaled so its largest bin is 1
pub fn chroma_stft(spec: &Spectrogram) -> Array2<f64> {
    let sample_rate = spec.sample_rate as f64;
    let tuning = estimate_tuning(spec.power(), sample_rate);
    let filterbank = chroma_filterbank(sample_rate, N_FFT, tuning);
    let mut chroma = filterbank.dot(spec.power());

    for mut column in chroma.columns_mut() {
        let peak = column.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if peak >= TINY {
            column.mapv_inplace(|v| v / peak);
        }
    }
    chroma
}

/// Octave-band peak/valley contrast in dB, (7 × frames)
pub fn spectral_contrast(spec: &Spectrogram) -> Result<Array2<f64>, SpectralError> {
    let sample_rate = spec.sample_rate as f64;
    let nyquist = 0.5 * sample_rate;
    let freqs = spec.frequencies();
    let magnitude = spec.magnitude();
    let n_frames = spec.n_frames();

    let mut octa = vec![0.0f64; CONTRAST_BANDS + 2];
    for (i, edge) in octa.iter_mut().enumerate().skip(1) {
        *edge = CONTRAST_FMIN * 2f64.powi(i as i32 - 1);
    }
    if let Some(&edge_hz) = octa[..CONTRAST_BANDS + 1].iter().find(|&&e| e >= nyquist) {
        return Err(SpectralError::BandAboveNyquist {
            edge_hz,
            nyquist_hz: nyquist,
        });
    }

    let mut valley = Array2::<f64>::zeros((CONTRAST_BANDS + 1, n_frames));
    let mut peak = Array2::<f64>::zeros((CONTRAST_BANDS + 1, n_frames));
    let mut sorted = Vec::new();

    for k in 0..=CONTRAST_BANDS {
        let (f_low, f_high) = (octa[k], octa[k + 1]);
        let mut in_band: Vec<bool> = freqs.iter().map(|&f| f >= f_low && f <= f_high).collect();

        let first = in_band.iter().position(|&b| b);
        let last = in_band.iter().rposition(|&b| b);
        let (Some(first), Some(last)) = (first, last) else {
            return Err(SpectralError::EmptyBand { band: k });
        };
        if k > 0 {
            if let Some(below) = first.checked_sub(1) {
                in_band[below] = true;
            }
        }
        if k == CONTRAST_BANDS {
            in_band[last + 1..].iter_mut().for_each(|b| *b = true);
        }

        let band_size = in_band.iter().filter(|&&b| b).count();
        let mut rows: Vec<usize> = (0..in_band.len()).filter(|&i| in_band[i]).collect();
        if k < CONTRAST_BANDS {
            rows.pop();
        }

        let quantile_bins = ((CONTRAST_QUANTILE * band_size as f64).round_ties_even() as usize).max(1);
        let take = quantile_bins.min(rows.len());

        for t in 0..n_frames {
            sorted.clear();
            sorted.extend(rows.iter().map(|&r| magnitude[[r, t]]));
            sorted.sort_by(f64::total_cmp);
            valley[[k, t]] = mean(&sorted[..take]);
            peak[[k, t]] = mean(&sorted[sorted.len() - take..]);
        }
    }

    Ok(power_to_db(&peak) - power_to_db(&valley))
}

/// Column sums of |S|, replacing sub-normal totals with 1
fn column_l1_norms(s: &Array2<f64>) -> Vec<f64> {
    s.columns()
        .into_iter()
        .map(|col| {
            let total: f64 = col.iter().map(|v| v.abs()).sum();
            if total < TINY {
                1.0
            } else {
                total
            }
        })
        .collect()
}

/// Magnitude-weighted mean frequency per frame, (1 × frames)
pub fn spectral_centroid(spec: &Spectrogram) -> Array2<f64> {
    let freqs = spec.frequencies();
    let magnitude = spec.magnitude();
    let norms = column_l1_norms(magnitude);

    let mut centroid = Array2::<f64>::zeros((1, spec.n_frames()));
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        centroid[[0, t]] = col
            .iter()
            .zip(&freqs)
            .map(|(&m, &f)| f * m / norms[t])
            .sum();
    }
    centroid
}

/// Second-order spectral bandwidth around the centroid, (1 × frames)
pub fn spectral_bandwidth(spec: &Spectrogram) -> Array2<f64> {
    let freqs = spec.frequencies();
    let magnitude = spec.magnitude();
    let norms = column_l1_norms(magnitude);
    let centroid = spectral_centroid(spec);

    let mut bandwidth = Array2::<f64>::zeros((1, spec.n_frames()));
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        let c = centroid[[0, t]];
        let spread: f64 = col
            .iter()
            .zip(&freqs)
            .map(|(&m, &f)| m / norms[t] * (c - f).powi(2))
            .sum();
        bandwidth[[0, t]] = spread.sqrt();
    }
    bandwidth
}

/// Frequency below which 85% of each frame's magnitude lies, (1 × frames)
pub fn spectral_rolloff(spec: &Spectrogram) -> Array2<f64> {
    let freqs = spec.frequencies();
    let magnitude = spec.magnitude();

    let mut rolloff = Array2::<f64>::zeros((1, spec.n_frames()));
    let mut cumulative = Vec::with_capacity(freqs.len());
    for (t, col) in magnitude.columns().into_iter().enumerate() {
        cumulative.clear();
        let mut running = 0.0;
        for &m in col.iter() {
            running += m;
            cumulative.push(running);
        }
        let threshold = ROLL_PERCENT * running;
        rolloff[[0, t]] = cumulative
            .iter()
            .position(|&c| c >= threshold)
            .map(|k| freqs[k])
            .unwrap_or(f64::NAN);
    }
    rolloff
}

/// Fraction of sign changes per 2048-sample frame, (1 × frames)
///
/// Frames are centred with edge padding; samples within 1e-10 of zero count
/// as positive zero.
pub fn zero_crossing_rate(samples: &[f32]) -> Result<Array2<f64>, SpectralError> {
    ensure_finite(samples)?;
    let (Some(&head), Some(&tail)) = (samples.first(), samples.last()) else {
        return Err(SpectralError::EmptySignal);
    };

    let pad = ZCR_FRAME_LENGTH / 2;
    let negative = |x: f32| {
        let x = if x.abs() <= ZCR_THRESHOLD { 0.0 } else { x };
        x.is_sign_negative()
    };

    let signs: Vec<bool> = std::iter::repeat(head)
        .take(pad)
        .chain(samples.iter().copied())
        .chain(std::iter::repeat(tail).take(pad))
        .map(negative)
        .collect();

    let n_frames = 1 + samples.len() / HOP_LENGTH;
    let mut zcr = Array2::<f64>::zeros((1, n_frames));
    for t in 0..n_frames {
        let frame = &signs[t * HOP_LENGTH..t * HOP_LENGTH + ZCR_FRAME_LENGTH];
        let crossings = frame.windows(2).filter(|w| w[0] != w[1]).count();
        zcr[[0, t]] = crossings as f64 / ZCR_FRAME_LENGTH as f64;
    }
    Ok(zcr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 22050;

    fn tone(freq: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * sample_rate as f64) as usize;
        (0..n)
            .map(|i| (0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin()) as f32)
            .collect()
    }

    fn bin_frequency(bin: usize) -> f64 {
        bin as f64 * SR as f64 / N_FFT as f64
    }

    #[test]
    fn test_mel_scale_anchor_points() {
        assert!((hz_to_mel(500.0) - 7.5).abs() < 1e-12);
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-12);
        for hz in [0.0, 250.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stft_shape() {
        let spec = Spectrogram::compute(&vec![0.0; 22050], SR).unwrap();
        assert_eq!(spec.magnitude().dim(), (1025, 44));
        assert_eq!(spec.frequencies()[1024], 11025.0);
    }

    #[test]
    fn test_stft_rejects_non_finite() {
        let mut samples = vec![0.0f32; 4096];
        samples[10] = f32::NAN;
        assert_eq!(Spectrogram::compute(&samples, SR).unwrap_err(), SpectralError::NonFinite);
        assert_eq!(Spectrogram::compute(&[0.0], 0).unwrap_err(), SpectralError::ZeroSampleRate);
    }

    #[test]
    fn test_stft_peak_at_tone_bin() {
        let spec = Spectrogram::compute(&tone(bin_frequency(100), 1.0, SR), SR).unwrap();
        let column = spec.magnitude().column(20);
        let argmax = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(argmax, 100);
    }

    #[test]
    fn test_mel_filterbank_shape_and_coverage() {
        let fb = mel_filterbank(SR as f64, N_FFT, N_MELS);
        assert_eq!(fb.dim(), (128, 1025));
        assert!(fb.iter().all(|&w| w >= 0.0));
        for row in fb.rows() {
            assert!(row.sum() > 0.0);
        }
    }

    #[test]
    fn test_power_to_db_floor() {
        let s = Array2::from_shape_vec((1, 3), vec![1.0, 1e-20, 0.1]).unwrap();
        let db = power_to_db(&s);
        assert!((db[[0, 0]] - 0.0).abs() < 1e-12);
        assert!((db[[0, 1]] + 80.0).abs() < 1e-12);
        assert!((db[[0, 2]] + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_dct_of_constant_column() {
        let x = Array2::from_elem((128, 2), 3.0);
        let y = dct_ortho(&x, 13);
        assert_eq!(y.dim(), (13, 2));
        assert!((y[[0, 0]] - 3.0 * 128f64.sqrt()).abs() < 1e-9);
        for k in 1..13 {
            assert!(y[[k, 1]].abs() < 1e-9);
        }
    }

    #[test]
    fn test_pitch_tuning_histogram() {
        assert_eq!(pitch_tuning(&[]), 0.0);
        assert!(pitch_tuning(&[440.0, 880.0, 220.0]).abs() < 1e-9);

        let sharp = 440.0 * 2f64.powf(0.23 / 12.0);
        let tuning = pitch_tuning(&[sharp, sharp, 440.0]);
        assert!((tuning - 0.23).abs() < 0.011, "tuning = {}", tuning);
    }

    #[test]
    fn test_chroma_of_a440_peaks_at_a() {
        let spec = Spectrogram::compute(&tone(440.0, 1.0, SR), SR).unwrap();
        let chroma = chroma_stft(&spec);
        assert_eq!(chroma.dim(), (12, spec.n_frames()));

        let column = chroma.column(20);
        let argmax = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(argmax, 9);
        assert!((column[9] - 1.0).abs() < 1e-12);
        assert!(chroma.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
    }

    #[test]
    fn test_centroid_and_rolloff_of_tone() {
        let spec = Spectrogram::compute(&tone(bin_frequency(100), 1.0, SR), SR).unwrap();
        let centroid = spectral_centroid(&spec)[[0, 20]];
        assert!((centroid - bin_frequency(100)).abs() / bin_frequency(100) < 0.01);

        let rolloff = spectral_rolloff(&spec)[[0, 20]];
        assert!(rolloff >= bin_frequency(100) && rolloff <= bin_frequency(102));

        let bandwidth = spectral_bandwidth(&spec)[[0, 20]];
        assert!(bandwidth > 0.0 && bandwidth < bin_frequency(10));
    }

    #[test]
    fn test_silence_is_finite_everywhere() {
        let spec = Spectrogram::compute(&vec![0.0; 8192], SR).unwrap();
        assert!(spectral_centroid(&spec).iter().all(|&v| v == 0.0));
        assert!(spectral_rolloff(&spec).iter().all(|&v| v == 0.0));
        assert!(chroma_stft(&spec).iter().all(|&v| v == 0.0));
        assert!(spectral_contrast(&spec).unwrap().iter().all(|&v| v == 0.0));
        assert!(mfcc(&spec, 13).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_contrast_shape_and_nyquist_check() {
        let spec = Spectrogram::compute(&tone(1000.0, 0.5, SR), SR).unwrap();
        assert_eq!(spectral_contrast(&spec).unwrap().dim(), (7, spec.n_frames()));

        let low_rate = Spectrogram::compute(&tone(1000.0, 0.5, 8000), 8000).unwrap();
        assert!(matches!(
            spectral_contrast(&low_rate),
            Err(SpectralError::BandAboveNyquist { .. })
        ));
    }

    #[test]
    fn test_zero_crossing_rate() {
        let constant = vec![0.25f32; 8192];
        let zcr = zero_crossing_rate(&constant).unwrap();
        assert_eq!(zcr.dim(), (1, 17));
        assert!(zcr.iter().all(|&v| v == 0.0));

        let alternating: Vec<f32> = (0..8192).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let zcr = zero_crossing_rate(&alternating).unwrap();
        assert!((zcr[[0, 8]] - 2047.0 / 2048.0).abs() < 1e-12);

        let tiny: Vec<f32> = (0..4096).map(|i| if i % 2 == 0 { 1e-12 } else { -1e-12 }).collect();
        assert!(zero_crossing_rate(&tiny).unwrap().iter().all(|&v| v == 0.0));

        assert_eq!(zero_crossing_rate(&[]).unwrap_err(), SpectralError::EmptySignal);
    }
}
