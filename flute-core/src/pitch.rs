//! # Pitch Detection Module
//!
//! Time-domain autocorrelation tuned for a single clean wind-instrument tone.
//! The detector looks for the first strong, rising correlation peak after
//! the signal decorrelates from itself, which locks onto the fundamental
//! rather than the global maximum (harmonics produce competing peaks).
//!
//! ## Features
//! - RMS energy measurement for the silence gate
//! - Mean-absolute-difference autocorrelation over half the window
//! - First-qualifying-peak selection with parabolic-style refinement

/// Correlation a lag must exceed to enter a qualifying peak region.
pub const CORRELATION_THRESHOLD: f32 = 0.9;

/// Loose floor for the un-interpolated fallback when the scan ends while a
/// peak region is still rising.
pub const FALLBACK_CORRELATION_FLOOR: f32 = 0.01;

/// Scale applied to the interpolation shift around the best lag.
const INTERPOLATION_GAIN: f32 = 8.0;

/// Root-mean-square level of a signal. Empty input has zero energy.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Normalised correlation of the first `span` samples against the same
/// span shifted by `offset`: `1 - mean(|x[i] - x[i + offset]|)`.
fn correlation_at(signal: &[f32], span: usize, offset: usize) -> f32 {
    let diff: f32 = signal[..span]
        .iter()
        .zip(&signal[offset..offset + span])
        .map(|(a, b)| (a - b).abs())
        .sum();
    1.0 - diff / span as f32
}

/// Estimates the fundamental frequency of `signal` by autocorrelation.
///
/// The correlation span is the first half of the window. Lags are scanned
/// in increasing order; a lag qualifies once its correlation exceeds
/// `CORRELATION_THRESHOLD` and the previous lag's. Inside the qualifying
/// region the best lag is tracked, and the first lag that fails to qualify
/// ends the scan. The period is then refined from the neighbours of the
/// best lag.
///
/// This function applies no energy gate; callers check `rms` first.
///
/// # Arguments
/// * `signal` - Input samples in [-1, 1]
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No periodicity found, or a degenerate result
pub fn detect_pitch_autocorrelation(signal: &[f32], sample_rate: u32) -> Option<f32> {
    let span = signal.len() / 2;
    if span < 2 || sample_rate == 0 {
        return None;
    }
    let sample_rate = sample_rate as f32;

    let mut correlations = vec![0.0_f32; span];
    let mut best_offset: Option<usize> = None;
    let mut best_correlation = 0.0_f32;
    let mut last_correlation = 1.0_f32;
    let mut found_good_correlation = false;

    for offset in 0..span {
        let correlation = correlation_at(signal, span, offset);
        correlations[offset] = correlation;

        if correlation > CORRELATION_THRESHOLD && correlation > last_correlation {
            found_good_correlation = true;
            if correlation > best_correlation {
                best_correlation = correlation;
                best_offset = Some(offset);
            }
        } else if found_good_correlation {
            // Offset 0 never qualifies, so the best lag always has a left
            // neighbour, and the current offset is its right neighbour.
            let best = best_offset?;
            let shift = (correlations[best + 1] - correlations[best - 1]) / correlations[best];
            return finite_frequency(sample_rate / (best as f32 + INTERPOLATION_GAIN * shift));
        }
        last_correlation = correlation;
    }

    match best_offset {
        Some(best) if best_correlation > FALLBACK_CORRELATION_FLOOR => {
            finite_frequency(sample_rate / best as f32)
        }
        _ => None,
    }
}

fn finite_frequency(frequency: f32) -> Option<f32> {
    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}
