// flute-core/src/lib.rs

//! The core logic for the flute tuner.
//! This crate is responsible for monophonic pitch estimation, note
//! conversion and target-note matching. It is completely headless and
//! contains no UI code.
//!
//! Samples flow through `window::Framer` into `estimator::PitchEstimator`,
//! driven either from the audio callback (`acquisition::PushDetector`) or
//! from a polling loop (`acquisition::PullDetector`).

pub mod acquisition;
pub mod assessment;
pub mod config;
pub mod estimator;
pub mod hold;
pub mod matcher;
pub mod pitch;
pub mod smoothing;
pub mod tuning;
pub mod window;

#[cfg(feature = "capture")]
pub mod audio;
#[cfg(feature = "capture")]
pub mod session;

pub use acquisition::{
    EstimateSlot, PitchEvent, PullDetector, PushDetector, ResetHandle, SampleQueue,
};
pub use assessment::{NoteSummary, NoteTally};
pub use config::{ConfidenceMode, ConfigError, DetectorConfig};
pub use estimator::{PitchEstimate, PitchEstimator, SampleWindow};
pub use hold::{HoldStatus, NoteHold};
pub use matcher::{MatchResult, NoteMatcher, check_note_match};
pub use tuning::{frequency_to_note, note_to_frequency};
