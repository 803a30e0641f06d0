//! # Console Tuner Display
//!
//! Renders one estimate as a single status line: note, frequency, cents
//! offset and a text cent meter. Absence of pitch shows a neutral line
//! with the needle centred, never an error.

use flute_core::{HoldStatus, MatchResult, PitchEstimate};

/// Maximum cent deviation shown by the meter, in either direction.
const METER_RANGE: f32 = 50.0;

/// Cells on each side of the meter's centre mark.
const METER_HALF_WIDTH: usize = 10;

/// Deviation treated as in tune, in cents.
const IN_TUNE_CENTS: i32 = 10;

/// Text cent meter. `None` draws the empty meter.
pub fn cent_meter(cents: Option<i32>) -> String {
    let width = METER_HALF_WIDTH * 2 + 1;
    let mut cells = vec!['-'; width];
    cells[METER_HALF_WIDTH] = '|';

    if let Some(c) = cents {
        let clamped = (c as f32).clamp(-METER_RANGE, METER_RANGE);
        let offset = (clamped / METER_RANGE * METER_HALF_WIDTH as f32).round() as isize;
        let pos = (METER_HALF_WIDTH as isize + offset) as usize;
        cells[pos] = if c.abs() <= IN_TUNE_CENTS { '*' } else { 'o' };
    }

    format!("[{}]", cells.into_iter().collect::<String>())
}

fn tuning_label(cents: i32) -> &'static str {
    if cents.abs() <= IN_TUNE_CENTS {
        "in tune"
    } else if cents > 0 {
        "sharp"
    } else {
        "flat"
    }
}

/// Status line for one frame.
pub fn render_estimate(estimate: Option<&PitchEstimate>) -> String {
    match estimate {
        None => format!("{:<4} {:>8} Hz {:>5}  {}", "—", "—", "0¢", cent_meter(None)),
        Some(e) => format!(
            "{:<4} {:>8.1} Hz {:>5}  {}  {:<7}  conf {:.2}",
            e.full_note,
            e.frequency,
            format!("{:+}¢", e.cents),
            cent_meter(Some(e.cents)),
            tuning_label(e.cents),
            e.confidence
        ),
    }
}

/// Suffix describing the target comparison and hold progress.
pub fn render_target(target: &str, result: &MatchResult, hold: &HoldStatus) -> String {
    let verdict = if result.is_match { "MATCH" } else { "miss" };
    let hold = match hold {
        HoldStatus::Idle => String::new(),
        HoldStatus::Holding { progress, .. } => format!("  hold {:>3.0}%", progress * 100.0),
        HoldStatus::Rejected { average_accuracy } => {
            format!("  too unsteady ({:.0}%)", average_accuracy)
        }
        HoldStatus::Accepted { average_accuracy } => {
            format!("  accepted ({:.0}%)", average_accuracy)
        }
    };
    format!(" | {}: {} {:>3.0}%{}", target, verdict, result.accuracy, hold)
}
