use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

pub const INTRO_SILENCE_MS: u64 = 3000;
pub const INTER_CLIP_SILENCE_MS: u64 = 500;
pub const OUTRO_SILENCE_MS: u64 = 3000;

/// Longest fade applied at either edge of a background layer.
pub const MAX_FADE_MS: u64 = 500;

/// Gain used for a background volume ratio of zero.
pub const VOLUME_FLOOR_DB: f32 = -60.0;

/// Gain applied to background tracks that do not specify one.
pub const DEFAULT_BACKGROUND_VOLUME_DB: f32 = -10.0;

/// Volume ratio for page-range background tracks that do not specify one.
pub const DEFAULT_PAGE_RANGE_VOLUME: f32 = 0.25;

/// Configuration for one pipeline invocation.
///
/// Every field has a default, so a JSON file only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfiguration {
    /// Output sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Bit depth for PCM output (default: 16). Valid values: 16, 24.
    pub bit_depth: u16,

    /// Number of output channels (default: 2). Valid values: 1, 2.
    pub channels: u16,

    /// Silence before the first page.
    pub intro_silence_ms: u64,

    /// Silence between consecutive pages.
    pub inter_clip_silence_ms: u64,

    /// Silence after the last page.
    pub outro_silence_ms: u64,

    /// Directory where uploaded streams are staged for decoding.
    pub scratch_directory: PathBuf,

    /// Directory where finished episode files are written.
    pub output_directory: PathBuf,

    /// Write a `.metadata.json` sidecar next to each episode file.
    pub write_metadata: bool,
}

impl PipelineConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(format!("unsupported sample rate: {}", self.sample_rate));
        }
        if ![16, 24].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file, filling unspecified fields with defaults.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let json = fs::read_to_string(path)
            .map_err(|e| PipelineError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| PipelineError::ConfigurationFailed(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate().map_err(PipelineError::ConfigurationFailed)?;
        Ok(config)
    }
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bit_depth: 16,
            channels: 2,
            intro_silence_ms: INTRO_SILENCE_MS,
            inter_clip_silence_ms: INTER_CLIP_SILENCE_MS,
            outro_silence_ms: OUTRO_SILENCE_MS,
            scratch_directory: std::env::temp_dir(),
            output_directory: PathBuf::from("."),
            write_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PipelineConfiguration::default().validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_channels() {
        let config = PipelineConfiguration {
            channels: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let config = PipelineConfiguration {
            bit_depth: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{ "sample_rate": 48000, "channels": 1 }"#).unwrap();

        let config = PipelineConfiguration::load(&path).unwrap();

        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.intro_silence_ms, INTRO_SILENCE_MS);
        assert_eq!(config.inter_clip_silence_ms, INTER_CLIP_SILENCE_MS);
        assert_eq!(config.bit_depth, 16);
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{ "bit_depth": 12 }"#).unwrap();

        let err = PipelineConfiguration::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationFailed(_)));
    }
}
