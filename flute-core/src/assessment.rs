//! Summary of a listening window: which note was played most often and at
//! what average frequency.

use serde::Serialize;

use crate::estimator::PitchEstimate;

/// Result of `NoteTally::summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    /// Most frequent full note, e.g. "G4".
    pub note: String,
    /// Mean frequency of the readings of `note`, rounded to 0.1 Hz.
    pub frequency: f32,
    /// Readings of `note`.
    pub count: usize,
    /// All readings recorded.
    pub total: usize,
}

/// Collects estimates over a listening window.
#[derive(Debug, Clone, Default)]
pub struct NoteTally {
    readings: Vec<(String, f32)>,
}

impl NoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, estimate: &PitchEstimate) {
        self.readings.push((estimate.full_note.clone(), estimate.frequency));
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Most common note and its mean frequency, or `None` if nothing was
    /// recorded. Ties go to the note heard first.
    pub fn summary(&self) -> Option<NoteSummary> {
        // (note, count, frequency sum) in order of first appearance
        let mut counts: Vec<(&str, usize, f64)> = Vec::new();
        for (note, frequency) in &self.readings {
            match counts.iter_mut().find(|entry| entry.0 == note.as_str()) {
                Some(entry) => {
                    entry.1 += 1;
                    entry.2 += *frequency as f64;
                }
                None => counts.push((note.as_str(), 1, *frequency as f64)),
            }
        }

        let mut best: Option<&(&str, usize, f64)> = None;
        for entry in &counts {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }

        best.map(|&(note, count, sum)| NoteSummary {
            note: note.to_string(),
            frequency: ((sum / count as f64) * 10.0).round() as f32 / 10.0,
            count,
            total: self.readings.len(),
        })
    }
}
