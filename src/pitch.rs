//! # Pitch Model
//!
//! A pitch is a MIDI number (nominally 0-127) plus a cents deviation for
//! microtonal material. Literal syntax is a note letter `A`-`G`, an optional
//! accidental (`#`, `##`, `b`, `bb`, or `x` for double sharp), and an
//! optional octave number which may be negative. `C4` is MIDI 60; an omitted
//! octave defaults to 4.
//!
//! Formatting prefers sharp spellings, so parsing `"C#4"` and formatting the
//! result round-trips.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// A pitch: MIDI number plus cents deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    pub midi: i32,
    pub cents: f64,
}

/// Semitone offset of each natural letter from C.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Sharp-preferred note names for formatting.
const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl Pitch {
    /// Build from literal parts. `accidental` is the semitone adjustment
    /// (-2..=2), `octave` uses scientific pitch notation (C4 = 60).
    pub fn from_parts(letter: char, accidental: i32, octave: i32) -> Option<Pitch> {
        let base = letter_semitone(letter)?;
        Some(Pitch {
            midi: 12 * (octave + 1) + base + accidental,
            cents: 0.0,
        })
    }

    /// Parse a pitch literal like `C4`, `F#3`, `Bb-1`, `Gx5`, or bare `C`.
    pub fn parse(s: &str) -> Option<Pitch> {
        let mut chars = s.chars().peekable();
        let letter = chars.next()?;
        letter_semitone(letter)?;

        let mut accidental = 0i32;
        match chars.peek() {
            Some('#') => {
                chars.next();
                accidental = 1;
                if chars.peek() == Some(&'#') {
                    chars.next();
                    accidental = 2;
                }
            }
            Some('b') => {
                chars.next();
                accidental = -1;
                if chars.peek() == Some(&'b') {
                    chars.next();
                    accidental = -2;
                }
            }
            Some('x') => {
                chars.next();
                accidental = 2;
            }
            _ => {}
        }

        let rest: String = chars.collect();
        let octave = if rest.is_empty() {
            4
        } else {
            rest.parse::<i32>().ok()?
        };
        Pitch::from_parts(letter, accidental, octave)
    }

    /// Transpose by a signed number of semitones. Cents are preserved.
    pub fn transpose(self, semitones: i32) -> Pitch {
        Pitch {
            midi: self.midi + semitones,
            cents: self.cents,
        }
    }

    /// Pitch class 0-11 (C = 0).
    pub fn pitch_class(&self) -> i32 {
        self.midi.rem_euclid(12)
    }

    /// Octave number in scientific pitch notation (C4 = 60 is octave 4).
    pub fn octave(&self) -> i32 {
        self.midi.div_euclid(12) - 1
    }

    /// Canonical spelling, sharps preferred: MIDI 61 formats as `C#4`.
    pub fn name(&self) -> String {
        format!("{}{}", NAMES[self.pitch_class() as usize], self.octave())
    }

    /// True when the MIDI number is inside the 0-127 range.
    pub fn in_midi_range(&self) -> bool {
        (0..=127).contains(&self.midi)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Pitch", 2)?;
        s.serialize_field("midi", &self.midi)?;
        s.serialize_field("cents", &self.cents)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_c() {
        let p = Pitch::parse("C4").unwrap();
        assert_eq!(p.midi, 60);
        assert_eq!(p.cents, 0.0);
    }

    #[test]
    fn test_accidentals() {
        assert_eq!(Pitch::parse("C#4").unwrap().midi, 61);
        assert_eq!(Pitch::parse("Cb4").unwrap().midi, 59);
        assert_eq!(Pitch::parse("C##4").unwrap().midi, 62);
        assert_eq!(Pitch::parse("Cx4").unwrap().midi, 62);
        assert_eq!(Pitch::parse("Bbb3").unwrap().midi, 57);
    }

    #[test]
    fn test_negative_octave() {
        // C-1 is MIDI 0, the bottom of the range
        assert_eq!(Pitch::parse("C-1").unwrap().midi, 0);
        assert_eq!(Pitch::parse("A0").unwrap().midi, 21);
    }

    #[test]
    fn test_default_octave() {
        assert_eq!(Pitch::parse("C").unwrap().midi, 60);
        assert_eq!(Pitch::parse("G#").unwrap().midi, 68);
    }

    #[test]
    fn test_round_trip_spelling() {
        let p = Pitch::parse("C#4").unwrap();
        assert_eq!(p.midi, 61);
        assert_eq!(p.name(), "C#4");
    }

    #[test]
    fn test_transpose() {
        let p = Pitch::parse("C4").unwrap().transpose(7);
        assert_eq!(p.name(), "G4");
        let down = Pitch::parse("C4").unwrap().transpose(-1);
        assert_eq!(down.name(), "B3");
    }

    #[test]
    fn test_octave_extremes() {
        assert_eq!(Pitch::parse("C0").unwrap().midi, 12);
        assert_eq!(Pitch::parse("G9").unwrap().midi, 127);
        assert!(Pitch::parse("A9").unwrap().midi > 127);
        assert!(!Pitch::parse("A9").unwrap().in_midi_range());
    }

    #[test]
    fn test_invalid() {
        assert!(Pitch::parse("H4").is_none());
        assert!(Pitch::parse("C4x").is_none());
    }
}
