//! # Pitch Estimator
//!
//! Turns one window of samples into a smoothed note estimate. Each step is
//! a hard gate; a window that fails any of them produces no estimate:
//!
//! 1. Energy gate: RMS below the silence threshold
//! 2. Autocorrelation: no periodicity found
//! 3. Range gate: frequency outside `[minFreq, maxFreq]`
//!
//! Windows that pass are smoothed against the recent history, scored for
//! confidence and converted to a note. Silence and out-of-range pitch also
//! clear the smoothing history so a new attack starts fresh.

use serde::{Deserialize, Serialize};

use crate::config::{ConfidenceMode, ConfigError, DetectorConfig};
use crate::pitch;
use crate::smoothing::SmoothingState;
use crate::tuning;

/// Windows between periodic energy reports at debug level.
const ENERGY_REPORT_INTERVAL: u64 = 60;

/// A fixed-length block of mono samples and the rate they were taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleWindow {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One analysis frame's pitch reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchEstimate {
    /// Smoothed frequency in Hz, one decimal.
    pub frequency: f32,
    /// Pitch-class name, one of `tuning::NOTE_NAMES`.
    pub note: String,
    pub octave: i32,
    pub full_note: String,
    /// Offset from the nearest note, in [-50, 50].
    pub cents: i32,
    pub midi_note: i32,
    /// Stability of the reading, in [0, 1].
    pub confidence: f32,
    /// Frequency before smoothing, in Hz.
    pub raw_frequency: f32,
}

/// Autocorrelation pitch estimator with owned smoothing state.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    config: DetectorConfig,
    smoothing: SmoothingState,
    frames_analysed: u64,
}

impl PitchEstimator {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let smoothing = SmoothingState::new(config.history_size, config.smoothing_factor);
        Ok(Self {
            config,
            smoothing,
            frames_analysed: 0,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn smoothing(&self) -> &SmoothingState {
        &self.smoothing
    }

    /// Estimates the pitch of a captured window.
    pub fn estimate(&mut self, window: &SampleWindow) -> Option<PitchEstimate> {
        self.estimate_samples(window.samples(), window.sample_rate())
    }

    /// Estimates the pitch of a borrowed block of samples.
    pub fn estimate_samples(&mut self, samples: &[f32], sample_rate: u32) -> Option<PitchEstimate> {
        self.frames_analysed += 1;

        let rms = pitch::rms(samples);
        let audible = rms >= self.config.silence_rms_threshold;
        if self.frames_analysed % ENERGY_REPORT_INTERVAL == 0 {
            log::debug!(
                "Audio RMS: {:.4} {}",
                rms,
                if audible { "(signal)" } else { "(too quiet)" }
            );
        }
        if !audible {
            log::trace!("Window rejected: RMS {:.4} below silence threshold", rms);
            return self.no_pitch();
        }

        let Some(raw_frequency) = pitch::detect_pitch_autocorrelation(samples, sample_rate) else {
            log::trace!("Window rejected: no correlation peak");
            return self.no_pitch();
        };

        if raw_frequency < self.config.min_freq || raw_frequency > self.config.max_freq {
            log::trace!("Window rejected: {:.1} Hz outside instrument range", raw_frequency);
            return self.no_pitch();
        }

        let smoothed = self.smoothing.push(raw_frequency);
        let confidence = match self.config.confidence_mode {
            ConfidenceMode::Stability => self.smoothing.confidence(),
            ConfidenceMode::Fixed => 1.0,
        };

        let reading = tuning::frequency_to_note(smoothed, self.config.a4_reference);
        Some(PitchEstimate {
            frequency: reading.frequency,
            note: reading.note.to_string(),
            octave: reading.octave,
            full_note: reading.full_note,
            cents: reading.cents,
            midi_note: reading.midi_note,
            confidence,
            raw_frequency,
        })
    }

    /// Clears the smoothing history, e.g. when acquisition stops.
    pub fn reset(&mut self) {
        if !self.smoothing.is_empty() {
            log::debug!("Clearing pitch smoothing history");
        }
        self.smoothing.reset();
    }

    fn no_pitch(&mut self) -> Option<PitchEstimate> {
        self.smoothing.reset();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn sine_window(freq: f32, amplitude: f32) -> SampleWindow {
        let samples = (0..4096)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32;
                amplitude * phase.sin()
            })
            .collect();
        SampleWindow::new(samples, SAMPLE_RATE)
    }

    fn estimator() -> PitchEstimator {
        PitchEstimator::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = DetectorConfig {
            min_freq: 900.0,
            max_freq: 300.0,
            ..Default::default()
        };
        assert!(PitchEstimator::new(config).is_err());
    }

    #[test]
    fn g4_sine_is_detected_in_tune() {
        let estimate = estimator().estimate(&sine_window(392.0, 0.8)).unwrap();
        assert_eq!(estimate.note, "G");
        assert_eq!(estimate.octave, 4);
        assert_eq!(estimate.full_note, "G4");
        assert_eq!(estimate.midi_note, 67);
        assert!(estimate.cents.abs() <= 5, "cents {}", estimate.cents);
        assert_eq!(estimate.confidence, 1.0);
    }

    #[test]
    fn silence_yields_nothing_and_clears_history() {
        let mut estimator = estimator();
        estimator.estimate(&sine_window(440.0, 0.8)).unwrap();
        assert!(!estimator.smoothing().is_empty());

        let silence = SampleWindow::new(vec![0.0; 4096], SAMPLE_RATE);
        assert_eq!(estimator.estimate(&silence), None);
        assert!(estimator.smoothing().is_empty());
        assert_eq!(estimator.estimate(&silence), None);
    }

    #[test]
    fn quiet_tone_is_gated_by_threshold() {
        // RMS of a 0.02 amplitude sine is about 0.014.
        let quiet = sine_window(440.0, 0.02);
        assert_eq!(estimator().estimate(&quiet), None);

        let sensitive = DetectorConfig {
            silence_rms_threshold: crate::config::SILENCE_RMS_SENSITIVE,
            ..Default::default()
        };
        let mut estimator = PitchEstimator::new(sensitive).unwrap();
        assert!(estimator.estimate(&quiet).is_some());
    }

    #[test]
    fn out_of_range_tones_are_discarded() {
        let mut estimator = estimator();
        estimator.estimate(&sine_window(440.0, 0.8)).unwrap();

        assert_eq!(estimator.estimate(&sine_window(100.0, 0.8)), None);
        assert!(estimator.smoothing().is_empty());
        assert_eq!(estimator.estimate(&sine_window(2000.0, 0.8)), None);
    }

    #[test]
    fn pitch_change_is_damped_by_smoothing() {
        let mut estimator = estimator();
        for _ in 0..5 {
            estimator.estimate(&sine_window(440.0, 0.8)).unwrap();
        }
        let estimate = estimator.estimate(&sine_window(523.25, 0.8)).unwrap();
        // One new reading cannot move the median of five.
        assert_eq!(estimate.full_note, "A4");
        assert!(estimate.raw_frequency > 500.0);
    }

    #[test]
    fn fixed_confidence_mode_reports_one() {
        let config = DetectorConfig {
            confidence_mode: ConfidenceMode::Fixed,
            ..Default::default()
        };
        let mut estimator = PitchEstimator::new(config).unwrap();
        estimator.estimate(&sine_window(440.0, 0.8)).unwrap();
        let estimate = estimator.estimate(&sine_window(466.16, 0.8)).unwrap();
        assert_eq!(estimate.confidence, 1.0);
    }

    #[test]
    fn estimate_serialises_with_camel_case_keys() {
        let estimate = estimator().estimate(&sine_window(392.0, 0.8)).unwrap();
        let json = serde_json::to_value(&estimate).unwrap();
        assert_eq!(json["fullNote"], "G4");
        assert_eq!(json["midiNote"], 67);
        assert!(json.get("rawFrequency").is_some());
    }
}
