//! Audio decoding
//!
//! Decodes any container/codec symphonia supports (WAV, MP3, FLAC, M4A/AAC)
//! to mono f32 at the file's native sample rate. No resampling: the feature
//! transforms run at whatever rate the recording was made at.

use crate::extractors::PipelineError;
use crate::models::AudioClip;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Decode an audio file to a mono clip
///
/// The clip is named after the file name. Multi-channel audio is averaged
/// into one channel.
///
/// # Errors
/// * `AudioNotFound` if the file does not exist
/// * `InvalidAudio` if the file cannot be opened or decoded, has no audio
///   track, or reports no sample rate
pub fn decode_audio_file(path: &Path) -> Result<AudioClip, PipelineError> {
    let clip_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let invalid = |reason: String| PipelineError::InvalidAudio {
        clip: clip_name.clone(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::AudioNotFound {
                path: path.to_path_buf(),
            }
        } else {
            invalid(format!("cannot open file: {}", e))
        }
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| invalid(format!("unrecognised audio format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| invalid("no audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| invalid("sample rate unknown".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| invalid(format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(invalid(format!("error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_mono(&decoded, &mut samples),
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(clip = %clip_name, "Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(invalid(format!("decode failed: {}", e))),
        }
    }

    debug!(
        clip = %clip_name,
        sample_rate,
        samples = samples.len(),
        "Audio decoding complete"
    );

    Ok(AudioClip::new(clip_name, samples, sample_rate))
}

/// Average all channels of a decoded buffer and append to `out`
fn append_mono(decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => mix_down(buf, out),
        AudioBufferRef::U16(buf) => mix_down(buf, out),
        AudioBufferRef::U24(buf) => mix_down(buf, out),
        AudioBufferRef::U32(buf) => mix_down(buf, out),
        AudioBufferRef::S8(buf) => mix_down(buf, out),
        AudioBufferRef::S16(buf) => mix_down(buf, out),
        AudioBufferRef::S24(buf) => mix_down(buf, out),
        AudioBufferRef::S32(buf) => mix_down(buf, out),
        AudioBufferRef::F32(buf) => mix_down(buf, out),
        AudioBufferRef::F64(buf) => mix_down(buf, out),
    }
}

fn mix_down<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return;
    }
    out.reserve(buf.frames());
    for frame in 0..buf.frames() {
        let sum: f32 = (0..channels).map(|ch| f32::from_sample(buf.chan(ch)[frame])).sum();
        out.push(sum / channels as f32);
    }
}
