//! Live microphone sessions for both acquisition modes.
//!
//! A session owns the running `cpal::Stream`. Keep it on the thread that
//! created it; estimates cross threads through the channel or the slot.

use anyhow::{Context, Result};
use cpal::Stream;
use cpal::traits::StreamTrait;
use crossbeam_channel::Receiver;

use crate::acquisition::{
    self, EstimateSlot, PitchEvent, PullDetector, PushDetector, ResetHandle, SampleQueue,
};
use crate::audio::AudioInput;
use crate::config::DetectorConfig;
use crate::estimator::PitchEstimate;

/// Capacity of the push-mode event channel, in windows.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Push mode: the estimator runs in the audio callback.
pub struct PushSession {
    stream: Stream,
    sample_rate: u32,
    device_name: String,
    latest: EstimateSlot,
    reset: ResetHandle,
    /// Clone of the consumer's receiver, drained on stop.
    events: Receiver<PitchEvent>,
}

impl PushSession {
    /// Opens the input device and starts estimating in its callback.
    ///
    /// # Returns
    /// * `Ok((session, events))` - Running session and its event stream
    /// * `Err(e)` - Invalid config, or the device could not be started
    pub fn start(
        config: DetectorConfig,
        device: Option<&str>,
    ) -> Result<(Self, Receiver<PitchEvent>)> {
        config.validate().context("Invalid detector configuration")?;

        let input = AudioInput::open(device)?;
        let sample_rate = input.sample_rate();
        let device_name = input.name().to_string();

        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
        let mut detector = PushDetector::new(config, sample_rate, events_tx)?;
        let latest = detector.latest();
        let reset = detector.reset_handle();

        let stream = input.start(move |samples| detector.process(samples))?;
        log::info!("Push session started on {}", device_name);

        Ok((
            Self {
                stream,
                sample_rate,
                device_name,
                latest,
                reset,
                events: events_rx.clone(),
            },
            events_rx,
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Most recent estimate published by the audio thread.
    pub fn latest(&self) -> Option<PitchEstimate> {
        self.latest.latest().map(|estimate| (*estimate).clone())
    }

    /// Pauses capture and clears smoothing and queued events so a restart
    /// starts clean.
    pub fn stop(&mut self) -> Result<()> {
        self.stream.pause().context("Failed to pause input stream")?;
        self.reset.request();
        self.latest.clear();
        let discarded = acquisition::discard_pending(&self.events);
        log::info!("Push session stopped ({} pending events discarded)", discarded);
        Ok(())
    }

    /// Resumes a stopped session.
    pub fn resume(&mut self) -> Result<()> {
        self.stream.play().context("Failed to resume input stream")?;
        Ok(())
    }
}

/// Pull mode: the audio callback only queues samples; `poll` estimates.
pub struct PullSession {
    stream: Stream,
    device_name: String,
    queue: SampleQueue,
    detector: PullDetector,
}

impl PullSession {
    pub fn start(config: DetectorConfig, device: Option<&str>) -> Result<Self> {
        config.validate().context("Invalid detector configuration")?;

        let input = AudioInput::open(device)?;
        let device_name = input.name().to_string();
        let queue = SampleQueue::for_window(config.window_size);

        let mut detector = PullDetector::new(config, input.sample_rate())?;
        detector.attach(queue.clone());

        let producer = queue.clone();
        let stream = input.start(move |samples| producer.push(samples))?;
        log::info!("Pull session started on {}", device_name);

        Ok(Self {
            stream,
            device_name,
            queue,
            detector,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Estimates from the samples captured since the last poll.
    pub fn poll(&mut self) -> Option<PitchEstimate> {
        self.detector.poll()
    }

    /// Pauses capture and discards queued samples and smoothing.
    pub fn stop(&mut self) -> Result<()> {
        self.stream.pause().context("Failed to pause input stream")?;
        self.detector.detach();
        self.queue.clear();
        log::info!("Pull session stopped");
        Ok(())
    }

    /// Resumes a stopped session with fresh analysis state.
    pub fn resume(&mut self) -> Result<()> {
        self.queue.clear();
        self.detector.attach(self.queue.clone());
        self.stream.play().context("Failed to resume input stream")?;
        Ok(())
    }
}
