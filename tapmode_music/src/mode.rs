// Modal scale support: scale-degree to pitch arithmetic.
//
// A mode is a named list of semitone offsets from its root. Phrase
// generators move in signed scale degrees, and this module turns a degree
// into an absolute MIDI pitch. Negative degrees fold into lower octaves with
// floor division, so degree -1 in a 7-degree mode is the 7th degree one
// octave below the root.
//
// This module provides:
// - `Mode`, validated at construction and on deserialization
// - The seven church modes as a built-in catalogue
// - `pitch_for_degree` / `midi_pitch` (the checked variant used by generators)
// - `degree_for_arpeggio_step` for root-third-fifth climbing
//
// The pitch check is the engine's main numeric gate: every note event is
// built from a pitch that passed through `midi_pitch` or `note_pair`.

use crate::error::ComposeError;
use serde::{Deserialize, Serialize};

/// A named scale: semitone offsets of each degree within one octave.
///
/// Invariants: at least one interval, the first is 0, intervals never
/// decrease, and all lie in `0..=12` (an optional trailing 12 closes the
/// octave; lists that include it have 8 degrees).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMode")]
pub struct Mode {
    name: String,
    intervals: Vec<i32>,
}

#[derive(Deserialize)]
struct RawMode {
    name: String,
    intervals: Vec<i32>,
}

impl TryFrom<RawMode> for Mode {
    type Error = ComposeError;

    fn try_from(raw: RawMode) -> Result<Self, Self::Error> {
        Mode::new(raw.name, raw.intervals)
    }
}

/// Church modes, all with 7 degrees.
const CATALOGUE: &[(&str, [i32; 7])] = &[
    ("Ionian", [0, 2, 4, 5, 7, 9, 11]),
    ("Dorian", [0, 2, 3, 5, 7, 9, 10]),
    ("Phrygian", [0, 1, 3, 5, 7, 8, 10]),
    ("Lydian", [0, 2, 4, 6, 7, 9, 11]),
    ("Mixolydian", [0, 2, 4, 5, 7, 9, 10]),
    ("Aeolian", [0, 2, 3, 5, 7, 8, 10]),
    ("Locrian", [0, 1, 3, 5, 6, 8, 10]),
];

impl Mode {
    pub fn new(name: impl Into<String>, intervals: Vec<i32>) -> Result<Self, ComposeError> {
        let name = name.into();
        let malformed = |reason: &str| ComposeError::MalformedMode {
            name: name.clone(),
            reason: reason.to_string(),
        };
        if intervals.is_empty() {
            return Err(malformed("no intervals"));
        }
        if intervals[0] != 0 {
            return Err(malformed("first interval must be 0"));
        }
        if intervals.windows(2).any(|w| w[1] < w[0]) {
            return Err(malformed("intervals must not decrease"));
        }
        if intervals.iter().any(|&iv| !(0..=12).contains(&iv)) {
            return Err(malformed("intervals must lie within one octave"));
        }
        Ok(Mode { name, intervals })
    }

    /// Look up a church mode by name (case-insensitive).
    pub fn church(name: &str) -> Result<Self, ComposeError> {
        CATALOGUE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(n, ivs)| Mode {
                name: n.to_string(),
                intervals: ivs.to_vec(),
            })
            .ok_or_else(|| ComposeError::UnknownMode {
                name: name.to_string(),
            })
    }

    /// All seven church modes in catalogue order.
    pub fn church_modes() -> Vec<Mode> {
        CATALOGUE
            .iter()
            .map(|(n, ivs)| Mode {
                name: n.to_string(),
                intervals: ivs.to_vec(),
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intervals(&self) -> &[i32] {
        &self.intervals
    }

    /// Number of scale degrees per octave.
    pub fn degree_count(&self) -> usize {
        self.intervals.len()
    }

    /// Absolute pitch of a signed scale degree above `root`.
    ///
    /// `octave = floor(degree / n)`, `offset = degree mod n` (always
    /// non-negative), result `root + 12 * octave + intervals[offset]`.
    pub fn pitch_for_degree(&self, root: i32, degree: i32) -> i32 {
        let (octave, offset) = self.split_degree(degree);
        root + octave * 12 + self.intervals[offset]
    }

    /// `pitch_for_degree`, rejecting results outside the MIDI note range.
    pub fn midi_pitch(&self, root: i32, degree: i32) -> Result<i32, ComposeError> {
        let (_, offset) = self.split_degree(degree);
        let pitch = self.pitch_for_degree(root, degree);
        if !(0..=127).contains(&pitch) {
            return Err(ComposeError::PitchOutOfRange {
                pitch,
                root,
                degree,
                offset,
                mode: self.name.clone(),
            });
        }
        Ok(pitch)
    }

    fn split_degree(&self, degree: i32) -> (i32, usize) {
        let n = self.intervals.len() as i32;
        (degree.div_euclid(n), degree.rem_euclid(n) as usize)
    }
}

/// Map a linear arpeggio step to a scale degree, climbing in thirds.
///
/// Steps 0, 1, 2 are the root, third and fifth above `start_degree`; step 3
/// starts again one mode-octave higher. Negative steps descend the same way.
pub fn degree_for_arpeggio_step(mode_len: usize, start_degree: i32, step: i32) -> i32 {
    const CHORD: [i32; 3] = [0, 2, 4];
    let octave = step.div_euclid(3);
    let offset = step.rem_euclid(3) as usize;
    start_degree + octave * mode_len as i32 + CHORD[offset]
}

/// Note name with octave, MIDI 60 = "C4".
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    format!("{}{}", NAMES[(pitch % 12) as usize], pitch as i32 / 12 - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dorian() -> Mode {
        Mode::church("dorian").unwrap()
    }

    #[test]
    fn test_degrees_within_octave() {
        let mode = dorian();
        // D4 = 62
        assert_eq!(mode.pitch_for_degree(62, 0), 62);
        assert_eq!(mode.pitch_for_degree(62, 2), 65); // F
        assert_eq!(mode.pitch_for_degree(62, 4), 69); // A
        assert_eq!(mode.pitch_for_degree(62, 7), 74); // D5
    }

    #[test]
    fn test_negative_degree_wraps_down() {
        let mode = dorian();
        // One step below D is C, the 7th degree an octave down.
        assert_eq!(mode.pitch_for_degree(62, -1), 62 - 12 + 10);
        assert_eq!(mode.pitch_for_degree(62, -7), 50);
        // -15 in a 7-degree mode: down three octaves, up six degrees.
        assert_eq!(mode.pitch_for_degree(62, -15), 62 - 36 + 10);
    }

    #[test]
    fn test_eight_degree_mode_wraps() {
        let closed = Mode::new("Ionian8", vec![0, 2, 4, 5, 7, 9, 11, 12]).unwrap();
        assert_eq!(closed.degree_count(), 8);
        // -15 with 8 degrees: octave -2, offset 1.
        assert_eq!(closed.pitch_for_degree(60, -15), 60 - 24 + 2);
        assert_eq!(closed.pitch_for_degree(60, 7), 72);
    }

    #[test]
    fn test_octave_step_is_twelve_semitones() {
        for mode in Mode::church_modes() {
            let n = mode.degree_count() as i32;
            for d in -30..30 {
                assert_eq!(
                    mode.pitch_for_degree(40, d) - mode.pitch_for_degree(40, d + n),
                    -12,
                    "{} degree {d}",
                    mode.name()
                );
            }
        }
    }

    #[test]
    fn test_midi_pitch_rejects_out_of_range() {
        let mode = dorian();
        assert_eq!(mode.midi_pitch(60, 1).unwrap(), 62);
        let err = mode.midi_pitch(120, 14).unwrap_err();
        match err {
            ComposeError::PitchOutOfRange { pitch, degree, offset, mode, .. } => {
                assert_eq!(pitch, 144);
                assert_eq!(degree, 14);
                assert_eq!(offset, 0);
                assert_eq!(mode, "Dorian");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(mode.midi_pitch(2, -14).is_err());
    }

    #[test]
    fn test_malformed_modes_rejected() {
        assert!(Mode::new("empty", vec![]).is_err());
        assert!(Mode::new("offset", vec![1, 2, 3]).is_err());
        assert!(Mode::new("falling", vec![0, 4, 2]).is_err());
        assert!(Mode::new("wide", vec![0, 7, 14]).is_err());
        assert!(Mode::new("pair", vec![0, 7]).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"name":"Dorian","intervals":[0,2,3,5,7,9,10]}"#;
        let ok: Mode = serde_json::from_str(json).unwrap();
        assert_eq!(ok, dorian());
        let bad = serde_json::from_str::<Mode>(r#"{"name":"Bad","intervals":[0,0,4,0]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_unknown_church_mode() {
        assert!(matches!(
            Mode::church("Hypodorian"),
            Err(ComposeError::UnknownMode { .. })
        ));
        assert_eq!(Mode::church("AEOLIAN").unwrap().name(), "Aeolian");
    }

    #[test]
    fn test_arpeggio_steps_climb_in_thirds() {
        let degrees: Vec<i32> = (0..7).map(|s| degree_for_arpeggio_step(7, 0, s)).collect();
        assert_eq!(degrees, vec![0, 2, 4, 7, 9, 11, 14]);
        let down: Vec<i32> = (0..4).map(|s| degree_for_arpeggio_step(7, 2, -s)).collect();
        // -1 -> octave -1, offset 2: 2 - 7 + 4
        assert_eq!(down, vec![2, -1, -3, -5]);
    }

    #[test]
    fn test_pitch_name() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(69), "A4");
        assert_eq!(pitch_name(0), "C-1");
    }
}
