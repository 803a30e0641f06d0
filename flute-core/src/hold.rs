//! Hold-to-accept gating on top of the note matcher.
//!
//! A target note counts as played once it has matched continuously for the
//! required duration. Holds whose running accuracy is too poor are thrown
//! out early so a wobbling note cannot be accepted on time alone.

use std::time::{Duration, Instant};

use crate::config::DetectorConfig;
use crate::matcher::MatchResult;

/// Accuracies recorded before a poor hold can be rejected.
const MIN_SAMPLES_BEFORE_REJECT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum HoldStatus {
    /// Not matching the target.
    Idle,
    /// Matching; `progress` runs from 0 to 1 over the required duration.
    Holding { progress: f32, average_accuracy: f32 },
    /// The hold was discarded for low accuracy.
    Rejected { average_accuracy: f32 },
    /// Held long enough. The tracker is ready for the next note.
    Accepted { average_accuracy: f32 },
}

#[derive(Debug, Clone)]
pub struct NoteHold {
    required: Duration,
    min_accuracy: f32,
    started: Option<Instant>,
    accuracies: Vec<f32>,
}

impl NoteHold {
    pub fn new(required: Duration, min_accuracy: f32) -> Self {
        Self {
            required,
            min_accuracy,
            started: None,
            accuracies: Vec::new(),
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(Duration::from_millis(config.hold_ms), config.min_hold_accuracy)
    }

    pub fn required(&self) -> Duration {
        self.required
    }

    pub fn is_holding(&self) -> bool {
        self.started.is_some()
    }

    /// Feeds one frame's match result observed at `now`.
    pub fn update(&mut self, result: &MatchResult, now: Instant) -> HoldStatus {
        if !result.is_match {
            self.reset();
            return HoldStatus::Idle;
        }

        let started = *self.started.get_or_insert(now);
        self.accuracies.push(result.accuracy);
        let average_accuracy = self.average();

        if self.accuracies.len() > MIN_SAMPLES_BEFORE_REJECT
            && average_accuracy < self.min_accuracy
        {
            log::debug!("Hold rejected at {:.0}% average accuracy", average_accuracy);
            self.reset();
            return HoldStatus::Rejected { average_accuracy };
        }

        let elapsed = now.saturating_duration_since(started);
        if elapsed >= self.required {
            self.reset();
            return HoldStatus::Accepted { average_accuracy };
        }

        let progress = if self.required.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f32() / self.required.as_secs_f32()
        };
        HoldStatus::Holding {
            progress: progress.min(1.0),
            average_accuracy,
        }
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.accuracies.clear();
    }

    fn average(&self) -> f32 {
        if self.accuracies.is_empty() {
            return 0.0;
        }
        self.accuracies.iter().sum::<f32>() / self.accuracies.len() as f32
    }
}
