use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub overlay: OverlayConfig,
}

/// Audio chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk_window_secs: u32,
    pub min_residual_secs: u32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
    /// Filler phrases rejected case-insensitively (substring match).
    pub filler_phrases: Vec<String>,
    pub max_concurrent_inference: usize,
}

/// Overlay presentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    pub max_lines: usize,
    pub line_ttl_ms: u64,
    pub fade_after_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_window_secs: defaults::CHUNK_WINDOW_SECS,
            min_residual_secs: 1,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            filler_phrases: defaults::FILLER_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_concurrent_inference: defaults::MAX_CONCURRENT_INFERENCE,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_lines: defaults::MAX_TRANSCRIPT_LINES,
            line_ttl_ms: defaults::LINE_TTL_MS,
            fade_after_ms: defaults::LINE_FADE_MS,
        }
    }
}

impl AudioConfig {
    /// Chunk window size in samples.
    pub fn chunk_window_samples(&self) -> usize {
        (self.sample_rate * self.chunk_window_secs) as usize
    }

    /// Samples retained after extraction (half the window).
    pub fn overlap_samples(&self) -> usize {
        self.chunk_window_samples() / 2
    }

    /// Minimum residual buffer length worth a final inference pass.
    pub fn min_residual_samples(&self) -> usize {
        (self.sample_rate * self.min_residual_secs) as usize
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TABSCRIBE_MODEL → stt.model
    /// - TABSCRIBE_LANGUAGE → stt.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("TABSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("TABSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/tabscribe/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("tabscribe")
            .join("config.toml")
    }
}
