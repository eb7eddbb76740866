// Note and meta events: the engine's output vocabulary.
//
// Tracks are flat, ordered lists of events with delta times in ticks, the
// shape a Standard MIDI File serializer consumes. The engine is monophonic:
// each note is a NoteOn with delta 0 followed directly by its NoteOff, whose
// delta is the note's sounding length. `note_pair` is the only constructor
// for note events, so that pairing holds structurally.
//
// `validate_events` re-checks a finished bar (pairing, MIDI ranges) before
// it is appended to a track. `meta_track` builds the fixed first track.
//
// Tick resolution and the sixteenth-note grid are fixed constants here;
// every duration in the engine is expressed in terms of them.

use crate::error::ComposeError;
use serde::{Deserialize, Serialize};

/// Ticks per quarter-note beat.
pub const TICKS_PER_BEAT: u32 = 960;

/// Ticks per sixteenth note, the phrase generators' step size.
pub const SIXTEENTH_TICKS: u32 = 240;

/// Sixteenth-note steps per beat.
pub const SUBDIVISIONS_PER_BEAT: u32 = TICKS_PER_BEAT / SIXTEENTH_TICKS;

/// Velocity used when a note does not ask for one.
pub const DEFAULT_VELOCITY: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// One note-on or note-off event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub kind: NoteKind,
    /// Ticks since the previous event in the same track.
    pub delta_ticks: u32,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    /// Which generator produced the note (NoteOn only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    /// Mode name in effect when the note was produced (NoteOn only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Track-level meta events carried by the first track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MetaEvent {
    TimeSignature {
        numerator: u8,
        denominator: u8,
        metronome: u8,
        thirty_seconds: u8,
    },
    SetTempo {
        micros_per_beat: u32,
    },
    EndOfTrack,
}

/// Everything needed to build one note.
#[derive(Debug, Clone)]
pub struct NoteSpec<'a> {
    pub pitch: i32,
    pub length_ticks: u32,
    pub velocity: u32,
    pub channel: u8,
    pub creator: &'a str,
    pub mode: Option<&'a str>,
}

impl<'a> NoteSpec<'a> {
    /// A sixteenth note on channel 0 at the default velocity.
    pub fn new(pitch: i32, creator: &'a str) -> Self {
        NoteSpec {
            pitch,
            length_ticks: SIXTEENTH_TICKS,
            velocity: DEFAULT_VELOCITY as u32,
            channel: 0,
            creator,
            mode: None,
        }
    }

    pub fn length(mut self, ticks: u32) -> Self {
        self.length_ticks = ticks;
        self
    }

    pub fn velocity(mut self, velocity: u32) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Build the NoteOn/NoteOff pair for one note.
pub fn note_pair(spec: NoteSpec<'_>) -> Result<[NoteEvent; 2], ComposeError> {
    let invalid = |reason: String| ComposeError::InvalidNote {
        creator: spec.creator.to_string(),
        reason,
    };
    let note = u8::try_from(spec.pitch)
        .ok()
        .filter(|&n| n <= 127)
        .ok_or_else(|| invalid(format!("pitch {} outside 0..=127", spec.pitch)))?;
    let velocity = u8::try_from(spec.velocity)
        .ok()
        .filter(|&v| v <= 127)
        .ok_or_else(|| invalid(format!("velocity {} outside 0..=127", spec.velocity)))?;
    if spec.channel > 15 {
        return Err(invalid(format!("channel {} outside 0..=15", spec.channel)));
    }
    if spec.length_ticks == 0 {
        return Err(invalid("zero-length note".to_string()));
    }

    Ok([
        NoteEvent {
            kind: NoteKind::NoteOn,
            delta_ticks: 0,
            channel: spec.channel,
            note,
            velocity,
            creator: Some(spec.creator.to_string()),
            mode: spec.mode.map(str::to_string),
        },
        NoteEvent {
            kind: NoteKind::NoteOff,
            delta_ticks: spec.length_ticks,
            channel: spec.channel,
            note,
            velocity: 0,
            creator: None,
            mode: None,
        },
    ])
}

/// Check ranges and on/off pairing over a finished run of events.
///
/// Every NoteOn must be closed by exactly one later NoteOff with the same
/// note and channel before the run ends, and no NoteOff may appear without
/// an open NoteOn.
pub fn validate_events(events: &[NoteEvent]) -> Result<(), ComposeError> {
    let mut open: Vec<(u8, u8, usize)> = Vec::new();
    for (index, e) in events.iter().enumerate() {
        let bad = |reason: String| ComposeError::InvalidEvent { index, reason };
        if e.note > 127 {
            return Err(bad(format!("note number {}", e.note)));
        }
        if e.velocity > 127 {
            return Err(bad(format!("velocity {}", e.velocity)));
        }
        if e.channel > 15 {
            return Err(bad(format!("channel {}", e.channel)));
        }
        match e.kind {
            NoteKind::NoteOn => open.push((e.note, e.channel, index)),
            NoteKind::NoteOff => {
                let pos = open
                    .iter()
                    .position(|&(n, c, _)| n == e.note && c == e.channel)
                    .ok_or_else(|| bad(format!("note-off {} without note-on", e.note)))?;
                open.remove(pos);
            }
        }
    }
    if let Some(&(note, _, index)) = open.first() {
        return Err(ComposeError::InvalidEvent {
            index,
            reason: format!("note-on {note} never released"),
        });
    }
    Ok(())
}

/// Total length of a run of events in ticks.
pub fn total_ticks(events: &[NoteEvent]) -> u64 {
    events.iter().map(|e| e.delta_ticks as u64).sum()
}

/// The fixed meta track: time signature, tempo, end of track.
pub fn meta_track(beats_per_bar: u32, micros_per_beat: u32) -> Vec<MetaEvent> {
    vec![
        MetaEvent::TimeSignature {
            numerator: beats_per_bar.min(u8::MAX as u32) as u8,
            denominator: 4,
            metronome: 1,
            thirty_seconds: 8,
        },
        MetaEvent::SetTempo { micros_per_beat },
        MetaEvent::EndOfTrack,
    ]
}
