//! Target-note comparison for pass/fail note matching.

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::estimator::PitchEstimate;
use crate::tuning;

/// Outcome of comparing an estimate with a target note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Same pitch class as the target and within tolerance.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Linear score in [0, 100], 0 at 50 cents off.
    pub accuracy: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cents: Option<i32>,
}

impl MatchResult {
    fn absent() -> Self {
        Self {
            is_match: false,
            accuracy: 0.0,
            cents: None,
        }
    }
}

/// Scores a pitch estimate against a target note.
///
/// The comparison is octave-independent: `target` may be a bare pitch
/// class ("G") or a full note ("G4"); only the pitch class is compared.
/// Accuracy depends on cents alone, so a near miss on the right pitch
/// class still earns partial credit.
pub fn check_note_match(
    estimate: Option<&PitchEstimate>,
    target: &str,
    tolerance_cents: u32,
) -> MatchResult {
    let Some(estimate) = estimate else {
        return MatchResult::absent();
    };

    let cents_off = estimate.cents.unsigned_abs();
    let same_class = tuning::pitch_class_of(target).is_some_and(|class| class == estimate.note);

    MatchResult {
        is_match: same_class && cents_off <= tolerance_cents,
        accuracy: (100.0 - cents_off as f32 * 2.0).max(0.0),
        cents: Some(estimate.cents),
    }
}

/// Note matcher bound to a fixed tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMatcher {
    tolerance_cents: u32,
}

impl NoteMatcher {
    pub fn new(tolerance_cents: u32) -> Self {
        Self { tolerance_cents }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.match_tolerance_cents)
    }

    pub fn tolerance_cents(&self) -> u32 {
        self.tolerance_cents
    }

    pub fn check(&self, estimate: Option<&PitchEstimate>, target: &str) -> MatchResult {
        check_note_match(estimate, target, self.tolerance_cents)
    }
}

impl Default for NoteMatcher {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}
