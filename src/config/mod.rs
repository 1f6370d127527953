use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::PipelineError;

/// Environment variable the API key is read from first.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const SECRETS_FILE: &str = "secrets.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External media tooling
    pub media: MediaConfig,

    /// Gemini API settings
    pub gemini: GeminiConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// ffmpeg binary name or path
    pub ffmpeg_binary: String,

    /// Constant bitrate for extracted MP3 audio
    pub audio_bitrate: String,

    /// Whisper CLI binary name or path
    pub whisper_binary: String,

    /// Whisper model profile to load
    pub whisper_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Model identifier used for summarization
    pub model: String,

    /// API base URL
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output root for single-file and web runs (current dir if unset)
    pub output_root: Option<PathBuf>,

    /// Maximum accepted input file size in megabytes (web front end)
    pub max_upload_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                ffmpeg_binary: "ffmpeg".to_string(),
                audio_bitrate: "320k".to_string(),
                whisper_binary: "whisper".to_string(),
                whisper_model: "small".to_string(),
            },
            gemini: GeminiConfig {
                model: "gemini-2.0-flash".to_string(),
                api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                timeout_secs: 120,
            },
            app: AppConfig {
                output_root: None,
                max_upload_mb: 1000,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Application configuration directory
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("video-summarizer"))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  ffmpeg binary: {}", self.media.ffmpeg_binary);
        println!("  Audio bitrate: {}", self.media.audio_bitrate);
        println!("  Whisper binary: {}", self.media.whisper_binary);
        println!("  Whisper model: {}", self.media.whisper_model);
        println!("  Gemini model: {}", self.gemini.model);
        println!("  Request timeout: {}s", self.gemini.timeout_secs);
        if let Some(root) = &self.app.output_root {
            println!("  Output root: {}", root.display());
        }
        println!("  Max upload size: {} MB", self.app.max_upload_mb);
    }
}

/// Resolve the Gemini API key: environment variable first, then the
/// secrets file written by `summarizer setup`.
pub fn resolve_api_key() -> Result<String, PipelineError> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }

    let dir = Config::config_dir().map_err(|_| PipelineError::MissingCredential)?;
    read_api_key_from(&dir).ok_or(PipelineError::MissingCredential)
}

/// Read the API key from `secrets.toml` under the given directory.
pub fn read_api_key_from(dir: &Path) -> Option<String> {
    let content = fs_err::read_to_string(dir.join(SECRETS_FILE)).ok()?;
    let table: toml::Table = content.parse().ok()?;
    table
        .get(API_KEY_ENV)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Store the API key in `secrets.toml` under the given directory,
/// preserving any unrelated keys already present.
pub fn store_api_key_in(dir: &Path, key: &str) -> Result<PathBuf> {
    fs_err::create_dir_all(dir)?;
    let path = dir.join(SECRETS_FILE);

    let mut table: toml::Table = if path.exists() {
        fs_err::read_to_string(&path)?
            .parse()
            .context("Failed to parse existing secrets file")?
    } else {
        toml::Table::new()
    };

    table.insert(
        API_KEY_ENV.to_string(),
        toml::Value::String(key.to_string()),
    );

    fs_err::write(&path, toml::to_string(&table)?).context("Failed to write secrets file")?;

    Ok(path)
}
