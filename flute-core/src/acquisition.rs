//! # Acquisition Adapters
//!
//! Two ways of driving the same estimator:
//!
//! - **Push**: `PushDetector::process` runs inside the audio callback and
//!   emits a `PitchEvent` for every completed window.
//! - **Pull**: the audio callback only fills a `SampleQueue`; the caller's
//!   loop (e.g. once per display frame) calls `PullDetector::poll`.
//!
//! Both frame their input with `Framer` and analyse every completed window
//! in order, so the same sample stream produces the same estimates. Only
//! the executing thread and the delivery mechanism differ.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::config::{ConfigError, DetectorConfig};
use crate::estimator::{PitchEstimate, PitchEstimator};
use crate::window::Framer;

/// Number of analysis windows a `SampleQueue` can hold before it starts
/// dropping its oldest samples.
const QUEUE_WINDOWS: usize = 4;

/// Outcome of one analysed window in push mode.
#[derive(Debug, Clone, PartialEq)]
pub enum PitchEvent {
    Pitch(PitchEstimate),
    Silence,
}

impl PitchEvent {
    fn from_outcome(outcome: Option<PitchEstimate>) -> Self {
        outcome.map_or(PitchEvent::Silence, PitchEvent::Pitch)
    }

    pub fn estimate(&self) -> Option<&PitchEstimate> {
        match self {
            PitchEvent::Pitch(estimate) => Some(estimate),
            PitchEvent::Silence => None,
        }
    }

    pub fn into_estimate(self) -> Option<PitchEstimate> {
        match self {
            PitchEvent::Pitch(estimate) => Some(estimate),
            PitchEvent::Silence => None,
        }
    }
}

/// Drops every event already waiting in `events`, returning how many.
///
/// Used when stopping, so a resumed session doesn't replay estimates
/// captured before the stop.
pub fn discard_pending(events: &Receiver<PitchEvent>) -> usize {
    events.try_iter().count()
}

/// Latest estimate shared between the audio thread and readers.
///
/// Publishing swaps the whole value, so a reader sees either the previous
/// estimate or the new one.
#[derive(Debug, Clone, Default)]
pub struct EstimateSlot {
    inner: Arc<RwLock<Option<Arc<PitchEstimate>>>>,
}

impl EstimateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, estimate: Option<PitchEstimate>) {
        let value = estimate.map(Arc::new);
        *self.inner.write() = value;
    }

    pub fn latest(&self) -> Option<Arc<PitchEstimate>> {
        self.inner.read().clone()
    }

    pub fn clear(&self) {
        self.publish(None);
    }
}

/// Cross-thread request to clear a detector's state before its next window.
#[derive(Debug, Clone, Default)]
pub struct ResetHandle {
    requested: Arc<AtomicBool>,
}

impl ResetHandle {
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// Estimator wrapper for the audio callback.
#[derive(Debug)]
pub struct PushDetector {
    estimator: PitchEstimator,
    framer: Framer,
    sample_rate: u32,
    events: Sender<PitchEvent>,
    latest: EstimateSlot,
    reset: ResetHandle,
    dropped_events: u64,
}

impl PushDetector {
    /// # Arguments
    /// * `config` - Detector configuration, validated here
    /// * `sample_rate` - Rate of the samples passed to `process`
    /// * `events` - Channel receiving one event per analysed window
    pub fn new(
        config: DetectorConfig,
        sample_rate: u32,
        events: Sender<PitchEvent>,
    ) -> Result<Self, ConfigError> {
        let framer = Framer::new(config.window_size);
        Ok(Self {
            estimator: PitchEstimator::new(config)?,
            framer,
            sample_rate,
            events,
            latest: EstimateSlot::new(),
            reset: ResetHandle::default(),
            dropped_events: 0,
        })
    }

    /// Shared view of the most recent estimate.
    pub fn latest(&self) -> EstimateSlot {
        self.latest.clone()
    }

    pub fn reset_handle(&self) -> ResetHandle {
        self.reset.clone()
    }

    /// Frames and analyses a chunk from the audio callback.
    ///
    /// Never blocks: events that don't fit in the channel are dropped.
    pub fn process(&mut self, samples: &[f32]) {
        if self.reset.take() {
            self.reset();
        }

        let Self {
            estimator,
            framer,
            sample_rate,
            events,
            latest,
            dropped_events,
            ..
        } = self;

        framer.push(samples, |window| {
            let outcome = estimator.estimate_samples(window, *sample_rate);
            latest.publish(outcome.clone());
            match events.try_send(PitchEvent::from_outcome(outcome)) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    *dropped_events += 1;
                    if *dropped_events % 100 == 1 {
                        log::warn!("Pitch consumer is behind; {} events dropped", dropped_events);
                    }
                }
            }
        });
    }

    /// Clears smoothing, the partial window and the latest estimate.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.framer.clear();
        self.latest.clear();
    }
}

#[derive(Debug, Default)]
struct QueueState {
    samples: VecDeque<f32>,
    /// Samples discarded on overflow since the last drain.
    dropped: usize,
}

/// Bounded FIFO of mono samples filled by the audio callback.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    inner: Arc<Mutex<QueueState>>,
    capacity: usize,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                samples: VecDeque::with_capacity(capacity),
                dropped: 0,
            })),
            capacity,
        }
    }

    /// Queue sized for `QUEUE_WINDOWS` analysis windows.
    pub fn for_window(window_size: usize) -> Self {
        Self::new(window_size * QUEUE_WINDOWS)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends samples, dropping the oldest ones once full.
    pub fn push(&self, samples: &[f32]) {
        let mut state = self.inner.lock();
        let skipped = samples.len().saturating_sub(self.capacity);
        let samples = &samples[skipped..];
        let overflow = (state.samples.len() + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            state.samples.drain(..overflow);
        }
        state.samples.extend(samples);
        state.dropped += skipped + overflow;
    }

    /// Moves every queued sample into `out`.
    ///
    /// Returns how many samples were dropped on overflow since the previous
    /// drain. Non-zero means `out` does not continue the last drained block.
    pub fn drain_into(&self, out: &mut Vec<f32>) -> usize {
        let mut state = self.inner.lock();
        out.extend(state.samples.drain(..));
        std::mem::take(&mut state.dropped)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().samples.is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.samples.clear();
        state.dropped = 0;
    }
}

/// Estimator wrapper for a polling loop on the caller's thread.
#[derive(Debug)]
pub struct PullDetector {
    estimator: PitchEstimator,
    framer: Framer,
    sample_rate: u32,
    source: Option<SampleQueue>,
    scratch: Vec<f32>,
    last: Option<PitchEstimate>,
}

impl PullDetector {
    pub fn new(config: DetectorConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        let framer = Framer::new(config.window_size);
        Ok(Self {
            estimator: PitchEstimator::new(config)?,
            framer,
            sample_rate,
            source: None,
            scratch: Vec::new(),
            last: None,
        })
    }

    /// Starts reading from `queue`.
    pub fn attach(&mut self, queue: SampleQueue) {
        self.source = Some(queue);
    }

    /// Stops reading and clears all analysis state.
    pub fn detach(&mut self) {
        self.source = None;
        self.reset();
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    /// Analyses whatever arrived since the last poll.
    ///
    /// Returns `None` without a source. When no new window completed the
    /// previous outcome is returned again.
    pub fn poll(&mut self) -> Option<PitchEstimate> {
        let source = self.source.as_ref()?;

        self.scratch.clear();
        let dropped = source.drain_into(&mut self.scratch);
        if dropped > 0 {
            log::debug!("Sample queue overflowed by {} samples; restarting window", dropped);
            self.framer.clear();
        }

        let Self {
            estimator,
            framer,
            sample_rate,
            scratch,
            last,
            ..
        } = self;

        framer.push(scratch, |window| {
            *last = estimator.estimate_samples(window, *sample_rate);
        });

        self.last.clone()
    }

    pub fn reset(&mut self) {
        self.estimator.reset();
        self.framer.clear();
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32;
                0.8 * phase.sin()
            })
            .collect()
    }

    fn small_config() -> DetectorConfig {
        DetectorConfig {
            window_size: 2048,
            ..Default::default()
        }
    }

    #[test]
    fn push_emits_one_event_per_window() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut detector = PushDetector::new(small_config(), SAMPLE_RATE, tx).unwrap();

        // 2048 + 3 hops of 1024 -> 4 windows.
        detector.process(&sine(440.0, 2048 + 3 * 1024));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.estimate().map(|p| p.note.as_str()) == Some("A")));

        let latest = detector.latest().latest().unwrap();
        assert_eq!(Some(latest.as_ref()), events.last().unwrap().estimate());
    }

    #[test]
    fn push_reports_silence_explicitly() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut detector = PushDetector::new(small_config(), SAMPLE_RATE, tx).unwrap();
        detector.process(&vec![0.0; 2048]);
        assert_eq!(rx.try_recv().unwrap(), PitchEvent::Silence);
        assert!(detector.latest().latest().is_none());
    }

    #[test]
    fn push_never_blocks_on_a_full_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut detector = PushDetector::new(small_config(), SAMPLE_RATE, tx).unwrap();
        detector.process(&sine(440.0, 2048 * 4));
        assert_eq!(rx.try_iter().count(), 1);
        assert!(detector.latest().latest().is_some());
    }

    #[test]
    fn reset_request_clears_state_before_next_window() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut detector = PushDetector::new(small_config(), SAMPLE_RATE, tx).unwrap();
        detector.process(&sine(440.0, 2048));
        assert!(detector.latest().latest().is_some());

        detector.reset_handle().request();
        detector.process(&[]);
        assert!(detector.latest().latest().is_none());
        assert!(detector.estimator.smoothing().is_empty());
    }

    #[test]
    fn stopping_discards_queued_events() {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let mut detector = PushDetector::new(small_config(), SAMPLE_RATE, tx).unwrap();
        detector.process(&sine(440.0, 2048 + 2 * 1024));
        assert_eq!(rx.len(), 3);

        let consumer = rx.clone();
        detector.reset_handle().request();
        assert_eq!(discard_pending(&rx), 3);
        assert!(consumer.is_empty());

        detector.process(&sine(392.0, 2048));
        let first = consumer.try_recv().unwrap().into_estimate().unwrap();
        assert_eq!(first.full_note, "G4");
    }

    #[test]
    fn pull_without_source_is_none() {
        let mut detector = PullDetector::new(small_config(), SAMPLE_RATE).unwrap();
        assert!(!detector.is_attached());
        assert_eq!(detector.poll(), None);
    }

    #[test]
    fn pull_repeats_last_outcome_until_a_new_window() {
        let queue = SampleQueue::for_window(2048);
        let mut detector = PullDetector::new(small_config(), SAMPLE_RATE).unwrap();
        detector.attach(queue.clone());

        queue.push(&sine(440.0, 2048));
        let first = detector.poll().unwrap();
        assert_eq!(first.full_note, "A4");
        assert_eq!(detector.poll(), Some(first));

        detector.detach();
        assert_eq!(detector.poll(), None);
    }

    #[test]
    fn queue_drops_oldest_samples_on_overflow() {
        let queue = SampleQueue::new(4);
        queue.push(&[1.0, 2.0, 3.0]);
        queue.push(&[4.0, 5.0, 6.0]);
        let mut out = Vec::new();
        queue.drain_into(&mut out);
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0]);
        assert!(queue.is_empty());

        queue.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn drain_reports_samples_lost_to_overflow() {
        let queue = SampleQueue::new(4);
        queue.push(&[1.0, 2.0, 3.0]);
        let mut out = Vec::new();
        assert_eq!(queue.drain_into(&mut out), 0);

        queue.push(&[4.0, 5.0, 6.0]);
        queue.push(&[7.0, 8.0, 9.0]);
        out.clear();
        assert_eq!(queue.drain_into(&mut out), 2);
        assert_eq!(out, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(queue.drain_into(&mut out), 0);

        queue.push(&[0.0; 10]);
        queue.clear();
        assert_eq!(queue.drain_into(&mut out), 0);
    }

    #[test]
    fn pull_restarts_framing_after_a_stalled_consumer() {
        let queue = SampleQueue::for_window(2048);
        let mut detector = PullDetector::new(small_config(), SAMPLE_RATE).unwrap();
        detector.attach(queue.clone());

        // Half a window of A4, then far more B4 than the queue holds.
        queue.push(&sine(440.0, 1024));
        assert_eq!(detector.poll(), None);
        queue.push(&sine(493.88, queue.capacity() + 4096));

        // Framing restarts at the surviving samples, exactly as a detector
        // that only ever saw them.
        let estimate = detector.poll().unwrap();
        assert_eq!(estimate.full_note, "B4");

        let mut fresh = PullDetector::new(small_config(), SAMPLE_RATE).unwrap();
        let replay = SampleQueue::for_window(2048);
        fresh.attach(replay.clone());
        let tail = sine(493.88, queue.capacity() + 4096);
        replay.push(&tail[tail.len() - queue.capacity()..]);
        assert_eq!(fresh.poll(), Some(estimate));
    }

    #[test]
    fn slot_replaces_whole_value() {
        let slot = EstimateSlot::new();
        assert!(slot.latest().is_none());
        let reader = slot.clone();

        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut detector = PushDetector::new(small_config(), SAMPLE_RATE, tx).unwrap();
        detector.process(&sine(440.0, 2048));
        let estimate = detector.latest().latest().unwrap();

        slot.publish(Some((*estimate).clone()));
        assert_eq!(reader.latest().as_deref(), Some(estimate.as_ref()));
        slot.clear();
        assert!(reader.latest().is_none());
    }
}
