use crate::defaults;
use crate::error::{Result, RillError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub feature: FeatureConfig,
    pub decode: DecodeConfig,
    pub rescore: RescoreConfig,
}

/// Feature extraction configuration
///
/// Consumed by the feature-extraction collaborator; the decoding core only
/// validates it for consistency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub num_bins: usize,
    pub frame_length_ms: u32,
    pub frame_shift_ms: u32,
}

/// Chunked decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecodeConfig {
    /// Feature frames per encoder chunk.
    pub chunk_size: usize,
    /// Lookahead frames required by the encoder at the chunk boundary.
    pub right_context: usize,
    /// Maximum candidates retained by the prefix search after pruning.
    pub beam_width: usize,
}

/// Second-pass rescoring configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RescoreConfig {
    pub enabled: bool,
    /// Beam candidates handed to the rescoring pass.
    pub top_k: usize,
    /// Weight applied to the prefix-search score in the combined score.
    pub search_weight: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            num_bins: defaults::NUM_BINS,
            frame_length_ms: defaults::FRAME_LENGTH_MS,
            frame_shift_ms: defaults::FRAME_SHIFT_MS,
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            chunk_size: defaults::CHUNK_SIZE,
            right_context: defaults::RIGHT_CONTEXT,
            beam_width: defaults::BEAM_WIDTH,
        }
    }
}

impl Default for RescoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: defaults::RESCORE_TOP_K,
            search_weight: defaults::SEARCH_WEIGHT,
        }
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
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - RILL_CHUNK_SIZE → decode.chunk_size
    /// - RILL_BEAM_WIDTH → decode.beam_width
    /// - RILL_RESCORE → rescore.enabled ("true"/"false")
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("RILL_CHUNK_SIZE")
            && let Ok(chunk_size) = value.parse::<usize>()
        {
            self.decode.chunk_size = chunk_size;
        }

        if let Ok(value) = std::env::var("RILL_BEAM_WIDTH")
            && let Ok(beam_width) = value.parse::<usize>()
        {
            self.decode.beam_width = beam_width;
        }

        if let Ok(value) = std::env::var("RILL_RESCORE")
            && let Ok(enabled) = value.parse::<bool>()
        {
            self.rescore.enabled = enabled;
        }

        self
    }

    /// Validate configuration values.
    ///
    /// Called at session construction so that inconsistent parameters are
    /// rejected before any audio flows.
    pub fn validate(&self) -> Result<()> {
        if self.feature.sample_rate == 0 {
            return Err(RillError::ConfigInvalidValue {
                key: "feature.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.feature.num_bins == 0 {
            return Err(RillError::ConfigInvalidValue {
                key: "feature.num_bins".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.feature.frame_shift_ms == 0 {
            return Err(RillError::ConfigInvalidValue {
                key: "feature.frame_shift_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.feature.frame_shift_ms > self.feature.frame_length_ms {
            return Err(RillError::ConfigInvalidValue {
                key: "feature.frame_shift_ms".to_string(),
                message: format!(
                    "must not exceed frame_length_ms ({})",
                    self.feature.frame_length_ms
                ),
            });
        }
        if self.decode.chunk_size == 0 {
            return Err(RillError::ConfigInvalidValue {
                key: "decode.chunk_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.decode.beam_width == 0 {
            return Err(RillError::ConfigInvalidValue {
                key: "decode.beam_width".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.rescore.top_k == 0 {
            return Err(RillError::ConfigInvalidValue {
                key: "rescore.top_k".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.rescore.search_weight.is_finite() || self.rescore.search_weight < 0.0 {
            return Err(RillError::ConfigInvalidValue {
                key: "rescore.search_weight".to_string(),
                message: "must be a non-negative finite number".to_string(),
            });
        }
        Ok(())
    }
}
