//! # Musical Tuning Module
//!
//! Equal-temperament conversions between frequencies and note names.
//! Both directions use the same chromatic table starting at C, so a note
//! converted to a frequency and back always yields the original note.
//!
//! ## Features
//! - Frequency to note name, octave, MIDI number and cents offset
//! - Note name (e.g. "G4", "C#5") to frequency
//! - Pitch-class lookups for octave-independent comparisons
//! - Cent deviation between two frequencies

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Chromatic pitch-class names, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Position of A in `NOTE_NAMES`.
const A_INDEX: i32 = 9;

/// MIDI note number of A4.
const A4_MIDI: i32 = 69;

/// Static map for quick pitch-class name to index lookups.
static NOTE_INDEX: Lazy<BTreeMap<&'static str, usize>> = Lazy::new(|| {
    NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i))
        .collect()
});

/// A frequency expressed as the nearest equal-tempered note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReading {
    /// Frequency in Hz, rounded to one decimal.
    pub frequency: f32,
    /// Pitch-class name (e.g. "G").
    pub note: &'static str,
    pub octave: i32,
    /// Note name with octave (e.g. "G4").
    pub full_note: String,
    /// Deviation from the nearest note, in [-50, 50].
    pub cents: i32,
    pub midi_note: i32,
}

/// Converts a frequency to the nearest note relative to `a4` Hz.
///
/// # Arguments
/// * `frequency` - Positive frequency in Hz
/// * `a4` - Reference frequency of A4 in Hz
pub fn frequency_to_note(frequency: f32, a4: f32) -> NoteReading {
    let semitones = 12.0 * (frequency / a4).log2();
    let nearest = semitones.round();

    let midi_note = nearest as i32 + A4_MIDI;
    let note = note_name_for_midi(midi_note);
    let octave = octave_for_midi(midi_note);
    let cents = ((semitones - nearest) * 100.0).round() as i32;

    NoteReading {
        frequency: (frequency * 10.0).round() / 10.0,
        note,
        octave,
        full_note: format!("{}{}", note, octave),
        cents,
        midi_note,
    }
}

/// Pitch-class name of a MIDI note number.
pub fn note_name_for_midi(midi_note: i32) -> &'static str {
    NOTE_NAMES[midi_note.rem_euclid(12) as usize]
}

/// Octave of a MIDI note number, where MIDI 60 is C4.
pub fn octave_for_midi(midi_note: i32) -> i32 {
    midi_note.div_euclid(12) - 1
}

/// Index of a pitch-class name in `NOTE_NAMES`.
pub fn pitch_class_index(name: &str) -> Option<usize> {
    NOTE_INDEX.get(name).copied()
}

/// Splits a note like "C#5" or "B-1" into its pitch-class index and octave.
///
/// Returns `None` when the octave is missing or the pitch class is unknown.
pub fn parse_note(name: &str) -> Option<(usize, i32)> {
    let (pitch_class, octave) = split_octave(name);
    let octave: i32 = octave?.parse().ok()?;
    Some((pitch_class_index(pitch_class)?, octave))
}

/// Returns the pitch-class part of a bare pitch class ("G") or a full note
/// ("G4"), or `None` if it isn't one of the twelve chromatic names.
pub fn pitch_class_of(name: &str) -> Option<&'static str> {
    let (pitch_class, _) = split_octave(name.trim());
    pitch_class_index(pitch_class).map(|i| NOTE_NAMES[i])
}

/// Converts a note name with octave to its equal-tempered frequency.
///
/// # Arguments
/// * `name` - Note name with octave (e.g. "G4", "C#5")
/// * `a4` - Reference frequency of A4 in Hz
///
/// # Returns
/// * `Some(frequency)` - Frequency in Hz
/// * `None` - Unrecognised pitch class, missing octave, or an octave too
///   extreme to yield a finite frequency
pub fn note_to_frequency(name: &str, a4: f32) -> Option<f32> {
    let (index, octave) = parse_note(name)?;
    let semitones = octave
        .checked_sub(4)?
        .checked_mul(12)?
        .checked_add(index as i32 - A_INDEX)?;
    let freq = a4 * 2.0_f32.powf(semitones as f32 / 12.0);
    (freq.is_finite() && freq > 0.0).then_some(freq)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Splits trailing octave digits (with an optional leading `-`) off a name.
fn split_octave(name: &str) -> (&str, Option<&str>) {
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    match digits_start {
        Some(start) => {
            let start = if name[..start].ends_with('-') { start - 1 } else { start };
            (&name[..start], Some(&name[start..]))
        }
        None => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_mapping() {
        let test_cases = [
            (440.0, "A4"),
            (493.88, "B4"),
            (523.25, "C5"),
            (392.0, "G4"),
            (261.63, "C4"),
            (1046.5, "C6"),
        ];

        for (freq, expected) in test_cases {
            let note = frequency_to_note(freq, 440.0);
            assert_eq!(note.full_note, expected, "{} Hz", freq);
            assert!(
                note.cents.abs() <= 1,
                "Frequency {} Hz should be close to perfect pitch, got {} cents off",
                freq,
                note.cents
            );
        }
    }

    #[test]
    fn a4_is_midi_69() {
        let note = frequency_to_note(440.0, 440.0);
        assert_eq!(note.midi_note, 69);
        assert_eq!(note.note, "A");
        assert_eq!(note.octave, 4);
        assert_eq!(note.cents, 0);
        assert_eq!(note.frequency, 440.0);
    }

    #[test]
    fn cents_sign_and_rounding() {
        // A quarter tone sharp of A4 is still A4 at +50 at most.
        let sharp = frequency_to_note(440.0 * 2.0_f32.powf(0.3 / 12.0), 440.0);
        assert_eq!(sharp.full_note, "A4");
        assert_eq!(sharp.cents, 30);

        let flat = frequency_to_note(440.0 * 2.0_f32.powf(-0.2 / 12.0), 440.0);
        assert_eq!(flat.full_note, "A4");
        assert_eq!(flat.cents, -20);
    }

    #[test]
    fn frequency_is_rounded_to_one_decimal() {
        let note = frequency_to_note(391.9954, 440.0);
        assert_eq!(note.frequency, 392.0);
    }

    #[test]
    fn reference_pitch_shifts_the_grid() {
        let note = frequency_to_note(442.0, 442.0);
        assert_eq!(note.full_note, "A4");
        assert_eq!(note.cents, 0);
        assert!((note_to_frequency("A4", 442.0).unwrap() - 442.0).abs() < 1e-3);
    }

    #[test]
    fn note_to_frequency_known_values() {
        assert!((note_to_frequency("A4", 440.0).unwrap() - 440.0).abs() < 1e-3);
        assert!((note_to_frequency("G4", 440.0).unwrap() - 392.0).abs() < 0.01);
        assert!((note_to_frequency("C4", 440.0).unwrap() - 261.63).abs() < 0.01);
        assert!((note_to_frequency("A#5", 440.0).unwrap() - 932.33).abs() < 0.01);
    }

    #[test]
    fn note_to_frequency_rejects_unknown_names() {
        assert_eq!(note_to_frequency("H4", 440.0), None);
        assert_eq!(note_to_frequency("Bb4", 440.0), None);
        assert_eq!(note_to_frequency("G", 440.0), None);
        assert_eq!(note_to_frequency("", 440.0), None);
    }

    #[test]
    fn note_to_frequency_rejects_extreme_octaves() {
        assert_eq!(note_to_frequency("C999999999", 440.0), None);
        assert_eq!(note_to_frequency("C-2147483648", 440.0), None);
        assert_eq!(note_to_frequency("A2147483647", 440.0), None);
        assert_eq!(note_to_frequency("C99999999999", 440.0), None);
        assert_eq!(note_to_frequency("C999", 440.0), None);
        assert!(note_to_frequency("C10", 440.0).is_some());
    }

    #[test]
    fn parse_note_handles_multi_digit_and_negative_octaves() {
        assert_eq!(parse_note("C10"), Some((0, 10)));
        assert_eq!(parse_note("B-1"), Some((11, -1)));
        assert_eq!(parse_note("F#3"), Some((6, 3)));
        assert_eq!(parse_note("#3"), None);
    }

    #[test]
    fn pitch_class_of_strips_octave() {
        assert_eq!(pitch_class_of("G4"), Some("G"));
        assert_eq!(pitch_class_of("C#"), Some("C#"));
        assert_eq!(pitch_class_of(" D#5 "), Some("D#"));
        assert_eq!(pitch_class_of("X2"), None);
    }

    #[test]
    fn midi_lookups_are_total() {
        assert_eq!(note_name_for_midi(0), "C");
        assert_eq!(octave_for_midi(0), -1);
        assert_eq!(note_name_for_midi(-1), "B");
        assert_eq!(octave_for_midi(-1), -2);
        assert_eq!(note_name_for_midi(60), "C");
        assert_eq!(octave_for_midi(60), 4);
    }

    #[test]
    fn round_trip_every_pitch_class() {
        for octave in 2..=7 {
            for name in NOTE_NAMES {
                let full = format!("{}{}", name, octave);
                let freq = note_to_frequency(&full, 440.0).unwrap();
                let back = frequency_to_note(freq, 440.0);
                assert_eq!(back.full_note, full);
                assert_eq!(back.cents, 0, "{} -> {} Hz", full, freq);

                let again = note_to_frequency(&back.full_note, 440.0).unwrap();
                assert!((again - freq).abs() < 1.0, "{}: {} vs {}", full, again, freq);
            }
        }
    }

    #[test]
    fn cents_deviation_of_an_octave() {
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((calculate_cents_deviation(440.0, 440.0)).abs() < 1e-6);
    }
}
