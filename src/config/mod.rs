//! Configuration management for voiceprint
//!
//! Values are resolved as environment > config file > defaults.

pub mod file;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::synthesis::{DEFAULT_CACHE_SIZE, DEFAULT_SLOT};
use crate::{Error, Result};

use file::VoiceprintConfigFile;

/// Voiceprint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path to data directory (database, artifacts)
    pub data_dir: PathBuf,

    /// Canonical profile sample rate in Hz
    pub sample_rate: u32,

    /// Sample rate of synthesized artifacts in Hz
    pub output_sample_rate: u32,

    /// Render backends in order of preference
    /// Set via `VOICEPRINT_BACKENDS` (comma separated)
    pub backend_priority: Vec<String>,

    /// Cloning backend used when building profiles
    pub enrollment_backend: Option<String>,

    /// Slot used when a request names none
    pub default_slot: String,

    /// Resolved profiles kept in memory
    pub profile_cache_size: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            output_sample_rate: DEFAULT_SAMPLE_RATE,
            backend_priority: Vec::new(),
            enrollment_backend: None,
            default_slot: DEFAULT_SLOT.to_string(),
            profile_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn load() -> Result<Self> {
        let file = file::load_config_file();
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn from_sources(
        file: VoiceprintConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = env("VOICEPRINT_DATA_DIR")
            .or(file.data_dir)
            .map_or(defaults.data_dir, PathBuf::from);

        let sample_rate = match env("VOICEPRINT_SAMPLE_RATE") {
            Some(value) => parse_rate("VOICEPRINT_SAMPLE_RATE", &value)?,
            None => file.audio.sample_rate.unwrap_or(defaults.sample_rate),
        };

        let output_sample_rate = match env("VOICEPRINT_OUTPUT_SAMPLE_RATE") {
            Some(value) => parse_rate("VOICEPRINT_OUTPUT_SAMPLE_RATE", &value)?,
            None => file
                .audio
                .output_sample_rate
                .unwrap_or(defaults.output_sample_rate),
        };

        let backend_priority = env("VOICEPRINT_BACKENDS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .or(file.backends.priority)
            .unwrap_or_default();

        let enrollment_backend = env("VOICEPRINT_ENROLLMENT_BACKEND")
            .or(file.backends.enrollment)
            .filter(|name| !name.trim().is_empty());

        let default_slot = file
            .synthesis
            .default_slot
            .unwrap_or(defaults.default_slot);

        let profile_cache_size = match file.synthesis.profile_cache_size {
            Some(size) => NonZeroUsize::new(size)
                .ok_or_else(|| Error::Config("profile_cache_size must be positive".to_string()))?,
            None => defaults.profile_cache_size,
        };

        let config = Self {
            data_dir,
            sample_rate,
            output_sample_rate,
            backend_priority,
            enrollment_backend,
            default_slot,
            profile_cache_size,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Config` error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        if self.output_sample_rate == 0 {
            return Err(Error::Config(
                "output_sample_rate must be positive".to_string(),
            ));
        }
        if self.default_slot.trim().is_empty() {
            return Err(Error::Config("default_slot must not be empty".to_string()));
        }
        Ok(())
    }

    /// Path of the `SQLite` database
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("voiceprint.db")
    }

    /// Root directory of synthesis artifacts
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "omni", "omni")
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("voiceprint"))
}

fn parse_rate(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a sample rate in Hz, got {value:?}")))
}
