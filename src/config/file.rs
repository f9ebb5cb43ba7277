//! TOML configuration file loading
//!
//! Supports `~/.config/omni/voiceprint/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceprintConfigFile {
    /// Directory holding the database and artifacts
    pub data_dir: Option<String>,

    /// Audio processing configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Backend selection configuration
    #[serde(default)]
    pub backends: BackendsFileConfig,

    /// Synthesis output configuration
    #[serde(default)]
    pub synthesis: SynthesisFileConfig,
}

/// Audio processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Canonical profile sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Sample rate of synthesized artifacts in Hz
    pub output_sample_rate: Option<u32>,
}

/// Backend selection configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendsFileConfig {
    /// Render backends in order of preference
    pub priority: Option<Vec<String>>,

    /// Cloning backend used when building profiles
    pub enrollment: Option<String>,
}

/// Synthesis output configuration
#[derive(Debug, Default, Deserialize)]
pub struct SynthesisFileConfig {
    /// Slot used when a request names none
    pub default_slot: Option<String>,

    /// Resolved profiles kept in memory
    pub profile_cache_size: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceprintConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoiceprintConfigFile {
    let Some(path) = config_file_path() else {
        return VoiceprintConfigFile::default();
    };

    if !path.exists() {
        return VoiceprintConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            VoiceprintConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<VoiceprintConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/omni/voiceprint/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("voiceprint")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let file: VoiceprintConfigFile = toml::from_str(
            r#"
            [backends]
            priority = ["elevenlabs", "say"]
            "#,
        )
        .unwrap();

        assert_eq!(
            file.backends.priority,
            Some(vec!["elevenlabs".to_string(), "say".to_string()])
        );
        assert!(file.audio.sample_rate.is_none());
        assert!(file.data_dir.is_none());
    }

    #[test]
    fn test_read_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sample_rate = [").unwrap();

        assert!(matches!(read_config_file(&path), Err(crate::Error::Toml(_))));
    }
}
