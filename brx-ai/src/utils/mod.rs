//! Utility modules for brx-ai

pub mod audio_decoder;
pub mod upload;

pub use audio_decoder::decode_audio_file;
pub use upload::{file_extension, is_allowed_audio_file, safe_filename};
