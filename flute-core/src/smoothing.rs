//! Median plus exponential smoothing of raw frequency readings.

use std::collections::VecDeque;

/// Smoothing history owned by a single estimator.
///
/// Holds the last smoothed output and a bounded FIFO of recent raw
/// frequencies. Cleared whenever a window yields no pitch, so the history
/// of one note never bleeds into the attack of the next.
#[derive(Debug, Clone)]
pub struct SmoothingState {
    history: VecDeque<f32>,
    capacity: usize,
    factor: f32,
    last_frequency: Option<f32>,
}

impl SmoothingState {
    pub fn new(capacity: usize, factor: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            factor,
            last_frequency: None,
        }
    }

    /// Adds a raw reading and returns the new smoothed frequency.
    ///
    /// The median of the history is approached from the previous output by
    /// `factor`; the first reading after a reset is the median itself.
    pub fn push(&mut self, raw_frequency: f32) -> f32 {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(raw_frequency);

        let median = self.median();
        let smoothed = match self.last_frequency {
            Some(prev) => prev + (median - prev) * self.factor,
            None => median,
        };
        self.last_frequency = Some(smoothed);
        smoothed
    }

    /// Stability of the history in [0, 1], from the relative drift between
    /// the oldest and newest readings.
    pub fn confidence(&self) -> f32 {
        let (Some(&oldest), Some(&newest)) = (self.history.front(), self.history.back()) else {
            return 0.0;
        };
        if self.history.len() < 2 || oldest <= 0.0 {
            return 1.0;
        }
        let variance = (newest - oldest).abs() / oldest;
        (1.0 - variance * 5.0).max(0.0)
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_frequency = None;
    }

    pub fn last_frequency(&self) -> Option<f32> {
        self.last_frequency
    }

    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    // Upper median for even lengths.
    fn median(&self) -> f32 {
        let mut sorted: Vec<f32> = self.history.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    }
}
