//! Configuration loading and resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`BRX_*`, `GEMINI_API_KEY`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: the service starts on defaults and
//! logs a warning. A TOML file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Duration every clip is padded/truncated to before feature extraction.
///
/// Must match the value used when the classifier was trained.
pub const TARGET_DURATION_SECONDS: f64 = 7.8560090702947845;

/// Statistic columns dropped before classification (training-time decision)
pub const EXCLUDED_FEATURES: [&str; 2] = ["mel_spectrogram_min", "chroma_stft_max"];

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BRX_CONFIG";

/// Environment variable holding the explanation service credential
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub explanation: ExplanationConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

/// HTTP server and upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload, in bytes
    pub max_file_size_bytes: u64,
    /// Accepted upload extensions (lowercase, without dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_file_size_bytes: 50 * 1024 * 1024,
            allowed_extensions: ["wav", "mp3", "flac", "m4a"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Per-request upload files are written here
    pub temp_dir: PathBuf,
    /// Serialized classifier artifact
    pub model_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            model_path: PathBuf::from("respiratory_classifier.json"),
        }
    }
}

/// Preprocessing pipeline parameters shared with training
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_duration_seconds: f64,
    pub excluded_features: Vec<String>,
    pub n_mfcc: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_duration_seconds: TARGET_DURATION_SECONDS,
            excluded_features: EXCLUDED_FEATURES.iter().map(|s| s.to_string()).collect(),
            n_mfcc: 13,
        }
    }
}

/// Remote explanation service (Gemini generateContent)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// No key means every request uses the local fallback
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            timeout_seconds: 30,
            max_attempts: 3,
            temperature: 0.1,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 2048,
        }
    }
}

impl ExplanationConfig {
    /// API key if present and non-blank
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|key| is_valid_key(key))
    }
}

/// Stale temp file sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub max_age_hours: u64,
    pub sweep_interval_minutes: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            sweep_interval_minutes: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, logs to stderr only if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Locate the config file
///
/// Priority: explicit path → `BRX_CONFIG` → `./brx-ai.toml` if present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from("brx-ai.toml");
    local.exists().then_some(local)
}

/// Parse a TOML document into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load config from a file, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

impl TomlConfig {
    /// Resolve config file + environment overrides
    pub fn resolve(cli_config_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_config_path) {
            Some(path) => load_toml_config(&path)?,
            None => {
                info!("No config file specified, using built-in defaults");
                TomlConfig::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `BRX_*` and `GEMINI_API_KEY` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BRX_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("BRX_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid BRX_PORT value '{}'", port),
            }
        }

        if let Ok(dir) = std::env::var("BRX_TEMP_DIR") {
            self.paths.temp_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("BRX_MODEL_PATH") {
            self.paths.model_path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("BRX_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if is_valid_key(&key) {
                if self.explanation.usable_api_key().is_some() {
                    warn!("Explanation API key found in both TOML and environment. Using environment.");
                }
                self.explanation.api_key = Some(key);
            }
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let duration = self.pipeline.target_duration_seconds;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::Config(format!(
                "pipeline.target_duration_seconds must be positive, got {}",
                duration
            )));
        }
        if self.pipeline.n_mfcc == 0 {
            return Err(Error::Config("pipeline.n_mfcc must be at least 1".to_string()));
        }
        if self.explanation.max_attempts == 0 {
            return Err(Error::Config(
                "explanation.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.server.allowed_extensions.is_empty() {
            return Err(Error::Config(
                "server.allowed_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
