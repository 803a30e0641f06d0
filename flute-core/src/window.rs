//! Fixed-size analysis windows from an arbitrary stream of chunks.
//!
//! Every acquisition mode frames its input through `Framer`, so push and
//! pull detection see exactly the same windows for the same stream.

use crate::estimator::SampleWindow;

/// Accumulates samples and yields half-overlapping windows.
///
/// Once `window_size` samples are buffered the window is handed out, then
/// the oldest `window_size / 2` samples are discarded. Successive windows
/// therefore advance by half their length.
#[derive(Debug, Clone)]
pub struct Framer {
    buffer: Vec<f32>,
    window_size: usize,
    hop: usize,
}

impl Framer {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(2);
        Self {
            buffer: Vec::with_capacity(window_size),
            window_size,
            hop: window_size / 2,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Samples by which consecutive windows advance.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Samples buffered toward the next window.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `samples`, calling `on_window` for every window completed.
    pub fn push(&mut self, mut samples: &[f32], mut on_window: impl FnMut(&[f32])) {
        while !samples.is_empty() {
            let take = (self.window_size - self.buffer.len()).min(samples.len());
            self.buffer.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.buffer.len() == self.window_size {
                on_window(&self.buffer);
                self.buffer.drain(..self.hop);
            }
        }
    }

    /// Appends `samples` and returns the completed windows as owned values.
    pub fn push_windows(&mut self, samples: &[f32], sample_rate: u32) -> Vec<SampleWindow> {
        let mut windows = Vec::new();
        self.push(samples, |w| windows.push(SampleWindow::new(w.to_vec(), sample_rate)));
        windows
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
