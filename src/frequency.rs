//! Key index → pitch. Index 0 is A0 (MIDI 21), index 87 is C8 (MIDI 108).

use crate::types::KEY_COUNT;

/// MIDI note number of the lowest piano key.
pub const LOWEST_MIDI: i32 = 21;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Equal-tempered frequency of a MIDI note number, A4 (69) = 440 Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Convert Hz to MIDI note number (fractional).
pub fn hz_to_midi(hz: f64) -> f64 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

pub fn key_to_midi(key_index: usize) -> i32 {
    key_index as i32 + LOWEST_MIDI
}

/// Fundamental frequency of a piano key. Index 48 is A4.
pub fn key_frequency(key_index: usize) -> f64 {
    midi_to_hz(key_to_midi(key_index) as f64)
}

/// Nearest key for a frequency, None if it falls off the keyboard.
pub fn key_for_frequency(hz: f64) -> Option<usize> {
    if hz.is_nan() || hz <= 0.0 {
        return None;
    }
    let key = hz_to_midi(hz).round() as i32 - LOWEST_MIDI;
    if (0..KEY_COUNT as i32).contains(&key) {
        Some(key as usize)
    } else {
        None
    }
}

/// Scientific pitch name, e.g. "A0", "C#4", "C8".
pub fn note_name(key_index: usize) -> String {
    let midi = key_to_midi(key_index);
    let octave = midi / 12 - 1;
    format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave)
}

pub fn is_black_key(key_index: usize) -> bool {
    NOTE_NAMES[(key_to_midi(key_index) % 12) as usize].ends_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_is_440() {
        assert!((key_frequency(48) - 440.0).abs() < 1e-9);
        assert_eq!(note_name(48), "A4");
    }

    #[test]
    fn test_octave_doubling() {
        for key in 0..KEY_COUNT - 12 {
            let ratio = key_frequency(key + 12) / key_frequency(key);
            assert!((ratio - 2.0).abs() < 1e-9, "key {}: ratio {}", key, ratio);
        }
    }

    #[test]
    fn test_keyboard_extremes() {
        assert!((key_frequency(0) - 27.5).abs() < 1e-9);
        assert!((key_frequency(87) - 4186.009).abs() < 0.01);
        assert_eq!(note_name(0), "A0");
        assert_eq!(note_name(87), "C8");
    }

    #[test]
    fn test_middle_c() {
        assert!((key_frequency(39) - 261.63).abs() < 0.01);
        assert_eq!(note_name(39), "C4");
        assert!(!is_black_key(39));
        assert!(is_black_key(40));
    }

    #[test]
    fn test_key_for_frequency() {
        for key in 0..KEY_COUNT {
            assert_eq!(key_for_frequency(key_frequency(key)), Some(key));
        }
        assert_eq!(key_for_frequency(10.0), None);
        assert_eq!(key_for_frequency(0.0), None);
        assert_eq!(key_for_frequency(8000.0), None);
    }
}
