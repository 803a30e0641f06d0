//! # Flute Tuner - Console Front End
//!
//! Live tuner on top of `flute-core`. Captures the microphone, prints one
//! refreshing status line per estimate and, with `--target`, scores the
//! played note against the target and tracks how long it is held.
//!
//! ## Architecture
//! - **Push mode**: estimation runs in the audio callback; estimates arrive
//!   over a crossbeam channel
//! - **Pull mode**: the callback only queues samples; this thread polls at
//!   roughly 60 Hz

mod display;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use flute_core::audio;
use flute_core::session::{PullSession, PushSession};
use flute_core::tuning;
use flute_core::{DetectorConfig, MatchResult, NoteHold, NoteMatcher, NoteTally, PitchEstimate};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Poll interval for pull mode, about one display frame.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// How long push mode waits for an event before rechecking the deadline.
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Estimate inside the audio callback
    Push,
    /// Estimate from a polling loop on the main thread
    Pull,
}

#[derive(Parser, Debug)]
#[command(name = "flute-tuner", version, about = "Real-time pitch tuner for wind instruments")]
struct Args {
    /// Acquisition mode
    #[arg(long, value_enum, default_value_t = Mode::Push)]
    mode: Mode,

    /// Target note to match, e.g. "G" or "G4"
    #[arg(long)]
    target: Option<String>,

    /// JSON detector config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input device name (default device if omitted)
    #[arg(long)]
    device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Override silenceRmsThreshold
    #[arg(long)]
    silence_threshold: Option<f32>,

    /// Override matchToleranceCents
    #[arg(long)]
    tolerance: Option<u32>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Print each estimate as a JSON line instead of the meter
    #[arg(long)]
    json: bool,

    /// On exit, report the most common note and its mean frequency
    #[arg(long)]
    summary: bool,
}

/// Consumer state: target matching, hold tracking and output.
struct Tuner {
    target: Option<String>,
    matcher: NoteMatcher,
    hold: NoteHold,
    tally: NoteTally,
    json: bool,
}

impl Tuner {
    fn new(config: &DetectorConfig, target: Option<String>, json: bool) -> Self {
        Self {
            target,
            matcher: NoteMatcher::from_config(config),
            hold: NoteHold::from_config(config),
            tally: NoteTally::new(),
            json,
        }
    }

    fn show(&mut self, estimate: Option<&PitchEstimate>) -> Result<()> {
        if let Some(e) = estimate {
            self.tally.record(e);
        }

        let target = match &self.target {
            Some(target) => {
                let result = self.matcher.check(estimate, target);
                let status = self.hold.update(&result, Instant::now());
                Some((target.as_str(), result, status))
            }
            None => None,
        };

        let mut out = std::io::stdout().lock();

        if self.json {
            let result = target.as_ref().map(|(_, result, _)| result);
            writeln!(out, "{}", json_line(estimate, result)?)?;
            return Ok(());
        }

        let mut line = display::render_estimate(estimate);
        if let Some((target, result, status)) = &target {
            line.push_str(&display::render_target(target, result, status));
        }
        write!(out, "\r{:<100}", line)?;
        out.flush()?;
        Ok(())
    }

    fn report_summary(&self) {
        match self.tally.summary() {
            Some(summary) => println!(
                "Detected: {} ({:.1} Hz, {} of {} readings)",
                summary.note, summary.frequency, summary.count, summary.total
            ),
            None => println!("No note detected"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_devices {
        let default = audio::default_input_device_name().ok();
        for name in audio::list_input_devices()? {
            let marker = if Some(&name) == default.as_ref() { " (default)" } else { "" };
            println!("{}{}", name, marker);
        }
        return Ok(());
    }

    let config = load_config(&args)?;

    if let Some(target) = &args.target {
        if tuning::pitch_class_of(target).is_none() {
            bail!("Unknown target note: {}", target);
        }
        if let Some(freq) = tuning::note_to_frequency(target, config.a4_reference) {
            println!("Target {} = {:.1} Hz", target, freq);
        }
    }

    let deadline = match args.duration {
        Some(secs) => Some(deadline_after(secs)?),
        None => None,
    };
    let mut tuner = Tuner::new(&config, args.target.clone(), args.json);

    match args.mode {
        Mode::Push => run_push(config, args.device.as_deref(), &mut tuner, deadline)?,
        Mode::Pull => run_pull(config, args.device.as_deref(), &mut tuner, deadline)?,
    }

    if !args.json {
        println!();
    }
    if args.summary {
        tuner.report_summary();
    }
    Ok(())
}

/// One JSON output line: the bare estimate, or `{estimate, match}` when a
/// target is being scored.
fn json_line(
    estimate: Option<&PitchEstimate>,
    result: Option<&MatchResult>,
) -> serde_json::Result<String> {
    match result {
        Some(result) => serde_json::to_string(&serde_json::json!({
            "estimate": estimate,
            "match": result,
        })),
        None => serde_json::to_string(&estimate),
    }
}

/// Instant `secs` seconds from now, rejecting values `Duration` can't hold.
fn deadline_after(secs: f64) -> Result<Instant> {
    let duration = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid --duration: {}", secs))?;
    match Instant::now().checked_add(duration) {
        Some(deadline) => Ok(deadline),
        None => bail!("--duration {} is too far in the future", secs),
    }
}

/// File config (or defaults) with command-line overrides applied.
fn load_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_path(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(threshold) = args.silence_threshold {
        config.silence_rms_threshold = threshold;
    }
    if let Some(tolerance) = args.tolerance {
        config.match_tolerance_cents = tolerance;
    }
    config.validate().context("Invalid detector configuration")?;
    log::debug!("Detector config: {:?}", config);
    Ok(config)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn run_push(
    config: DetectorConfig,
    device: Option<&str>,
    tuner: &mut Tuner,
    deadline: Option<Instant>,
) -> Result<()> {
    let (mut session, events) = PushSession::start(config, device)?;
    log::info!("Listening on {} at {} Hz (push)", session.device_name(), session.sample_rate());

    while !expired(deadline) {
        match events.recv_timeout(EVENT_TIMEOUT) {
            Ok(event) => tuner.show(event.estimate())?,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Audio stream closed");
                break;
            }
        }
    }

    session.stop()
}

fn run_pull(
    config: DetectorConfig,
    device: Option<&str>,
    tuner: &mut Tuner,
    deadline: Option<Instant>,
) -> Result<()> {
    let mut session = PullSession::start(config, device)?;
    log::info!("Listening on {} (pull)", session.device_name());

    while !expired(deadline) {
        let estimate = session.poll();
        tuner.show(estimate.as_ref())?;
        std::thread::sleep(POLL_INTERVAL);
    }

    session.stop()
}
