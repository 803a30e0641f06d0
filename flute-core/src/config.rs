//! # Detector Configuration
//!
//! Tunable parameters for the pitch estimator, the note matcher and the
//! hold tracker. Configuration is plain data: it can be built in code,
//! taken from `DetectorConfig::default()`, or loaded from a JSON file whose
//! keys use the same camelCase names as the estimate output.
//!
//! Every constructor that consumes a config validates it first. Malformed
//! configuration is the only condition in this crate that is reported as
//! an error; everything the estimator cannot analyse is simply "no pitch".

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Silence threshold that favours sensitivity. Quiet playing registers,
/// but breath noise and room bleed pass the gate more often.
pub const SILENCE_RMS_SENSITIVE: f32 = 0.008;

/// Silence threshold that favours rejecting ambient noise. Used as the
/// default because both acquisition modes share one gate.
pub const SILENCE_RMS_ROBUST: f32 = 0.02;

/// Smallest analysis window that still leaves room for interpolation
/// around a correlation peak.
pub const MIN_WINDOW_SIZE: usize = 4;

/// Accepted range for the note hold duration, in milliseconds.
pub const HOLD_MS_RANGE: (u64, u64) = (300, 2000);

/// How the estimator reports confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceMode {
    /// Derived from the spread of the recent frequency history.
    #[default]
    Stability,
    /// Always 1.0.
    Fixed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("minFreq ({min} Hz) must be below maxFreq ({max} Hz)")]
    InvalidFrequencyRange { min: f32, max: f32 },

    #[error("{name} must be a positive, finite frequency (got {value})")]
    NonPositiveFrequency { name: &'static str, value: f32 },

    #[error("silenceRmsThreshold must be finite and non-negative (got {0})")]
    InvalidSilenceThreshold(f32),

    #[error("smoothingFactor must lie strictly between 0 and 1 (got {0})")]
    InvalidSmoothingFactor(f32),

    #[error("historySize must be at least 1")]
    EmptyHistory,

    #[error("windowSize must be at least 4 samples (got {0})")]
    InvalidWindowSize(usize),

    #[error("holdMs must be between 300 and 2000 ms (got {0})")]
    InvalidHoldDuration(u64),

    #[error("minHoldAccuracy must be between 0 and 100 (got {0})")]
    InvalidHoldAccuracy(f32),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Recognised detector options. Missing JSON keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Lowest reportable frequency in Hz.
    pub min_freq: f32,
    /// Highest reportable frequency in Hz.
    pub max_freq: f32,
    /// Frequency of A4 in Hz.
    #[serde(rename = "A4Reference", alias = "a4Reference")]
    pub a4_reference: f32,
    /// RMS below which a window counts as silence.
    pub silence_rms_threshold: f32,
    /// Exponential smoothing factor toward the history median.
    pub smoothing_factor: f32,
    /// Number of raw frequencies kept for the median filter.
    pub history_size: usize,
    /// Maximum cents deviation that still counts as a match.
    pub match_tolerance_cents: u32,
    /// Samples per analysis window.
    pub window_size: usize,
    pub confidence_mode: ConfidenceMode,
    /// How long a matching note must be held to be accepted.
    pub hold_ms: u64,
    /// Mean accuracy below which a hold is rejected.
    pub min_hold_accuracy: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_freq: 250.0,
            max_freq: 1200.0,
            a4_reference: 440.0,
            silence_rms_threshold: SILENCE_RMS_ROBUST,
            smoothing_factor: 0.3,
            history_size: 5,
            match_tolerance_cents: 50,
            window_size: 4096,
            confidence_mode: ConfidenceMode::Stability,
            hold_ms: 800,
            min_hold_accuracy: 60.0,
        }
    }
}

impl DetectorConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_frequency("minFreq", self.min_freq)?;
        check_frequency("maxFreq", self.max_freq)?;
        check_frequency("A4Reference", self.a4_reference)?;

        if self.min_freq >= self.max_freq {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.min_freq,
                max: self.max_freq,
            });
        }
        if !self.silence_rms_threshold.is_finite() || self.silence_rms_threshold < 0.0 {
            return Err(ConfigError::InvalidSilenceThreshold(self.silence_rms_threshold));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor < 1.0) {
            return Err(ConfigError::InvalidSmoothingFactor(self.smoothing_factor));
        }
        if self.history_size == 0 {
            return Err(ConfigError::EmptyHistory);
        }
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        if !(HOLD_MS_RANGE.0..=HOLD_MS_RANGE.1).contains(&self.hold_ms) {
            return Err(ConfigError::InvalidHoldDuration(self.hold_ms));
        }
        if !(0.0..=100.0).contains(&self.min_hold_accuracy) {
            return Err(ConfigError::InvalidHoldAccuracy(self.min_hold_accuracy));
        }
        Ok(())
    }
}

fn check_frequency(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveFrequency { name, value })
    }
}
