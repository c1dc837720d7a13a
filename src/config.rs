//! Engine configuration
//!
//! Loaded from a TOML file under the platform config directory, with defaults
//! matching the fixed session format the remote side negotiates (22050 Hz
//! stereo s16) and a one-second jitter window.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, MAX_NETWORK_JITTER_MS};
use crate::error::{Error, Result};
use crate::format::{SampleFormat, StreamFormat};

/// Playback engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Session sample rate in Hz
    pub sample_rate: u32,
    /// Session channel count
    pub channels: u16,
    /// Session sample format
    pub sample_format: SampleFormat,
    /// Maximum expected network jitter in milliseconds; sizes the ring buffer
    pub max_jitter_ms: u32,
    /// Extra pre-roll delay added to the base silence pad on stream start
    pub extra_delay_ms: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            sample_format: SampleFormat::S16,
            max_jitter_ms: MAX_NETWORK_JITTER_MS,
            extra_delay_ms: 0,
        }
    }
}

impl PlaybackConfig {
    /// The session stream format described by this configuration
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_format, self.channels, self.sample_rate)
    }

    /// Default config file location under the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "remote-audio-playback")
            .map(|dirs| dirs.config_dir().join("playback.toml"))
    }

    /// Load from `path`, falling back to defaults if the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_format, SampleFormat::S16);
        assert_eq!(config.max_jitter_ms, 1000);
        assert_eq!(config.extra_delay_ms, 0);
        assert_eq!(config.stream_format().frame_bytes(), 4);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PlaybackConfig {
            sample_rate: 44100,
            channels: 1,
            sample_format: SampleFormat::U8,
            max_jitter_ms: 250,
            extra_delay_ms: 30,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: PlaybackConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.sample_rate, 44100);
        assert_eq!(parsed.sample_format, SampleFormat::U8);
        assert_eq!(parsed.extra_delay_ms, 30);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let parsed: PlaybackConfig = toml::from_str("max_jitter_ms = 500\n").unwrap();
        assert_eq!(parsed.max_jitter_ms, 500);
        assert_eq!(parsed.sample_rate, 22050);
        assert_eq!(parsed.sample_format, SampleFormat::S16);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config =
            PlaybackConfig::load(Path::new("/nonexistent/playback.toml")).unwrap();
        assert_eq!(config.sample_rate, 22050);
    }
}
