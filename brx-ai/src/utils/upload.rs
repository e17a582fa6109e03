//! Upload validation helpers

/// MIME types accepted for uploaded audio
pub const ALLOWED_MIME_TYPES: [&str; 11] = [
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/vnd.wave",
    "audio/mpeg",
    "audio/mp3",
    "audio/flac",
    "audio/x-flac",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
];

/// Lowercase extension of `filename`, without the dot
pub fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extension is allowed and the guessed MIME type (if any) is audio
pub fn is_allowed_audio_file(filename: &str, allowed_extensions: &[String]) -> bool {
    let lower = filename.to_lowercase();
    if !allowed_extensions
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext.to_lowercase())))
    {
        return false;
    }

    let guesses = mime_guess::from_path(&lower);
    guesses.is_empty() || guesses.iter().any(|mime| ALLOWED_MIME_TYPES.contains(&mime.essence_str()))
}

/// Replace characters outside `[A-Za-z0-9_.-]` (Unicode letters and digits
/// allowed) with `_` and cap the name at 100 characters, keeping the extension
pub fn safe_filename(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.chars().count() <= 100 {
        return safe;
    }

    let (stem, extension) = match safe.rfind('.') {
        Some(i) if i > 0 && !safe[..i].ends_with('.') => safe.split_at(i),
        _ => (safe.as_str(), ""),
    };
    let mut shortened: String = stem.chars().take(95).collect();
    shortened.push_str(extension);
    shortened
}
