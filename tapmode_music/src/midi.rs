// MIDI output from composed pieces.
//
// Converts a Piece into a Standard MIDI File (SMF) with two tracks: the
// meta track (time signature, tempo) followed by the requested role's note
// track. Event deltas are already in ticks at `TICKS_PER_BEAT`, so the
// conversion is one event to one event.
//
// `rescale_timing` works the other way round: it parses any SMF, multiplies
// every event delta by a factor and writes it back, which slows a rendered
// piece down (factor above 1) or speeds it up (below 1) without touching
// its tempo map.
//
// Uses the `midly` crate for MIDI reading and writing. Output is SMF Format 1
// (multi-track).

use crate::error::ComposeError;
use crate::event::{MetaEvent, NoteEvent, NoteKind, TICKS_PER_BEAT};
use crate::piece::{Piece, Role};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Render one role of a piece and write it to `path`.
pub fn write_midi(piece: &Piece, role: Role, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, midi_bytes(piece, role)?)
}

/// Render one role of a piece to SMF bytes.
pub fn midi_bytes(piece: &Piece, role: Role) -> std::io::Result<Vec<u8>> {
    let smf = piece_to_smf(piece, role);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Convert one role of a piece to an in-memory SMF.
pub fn piece_to_smf(piece: &Piece, role: Role) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_BEAT as u16)),
    ));

    // Track 0: time signature and tempo
    let meta_track: Track<'static> = piece.meta.iter().map(meta_event).collect();
    smf.tracks.push(meta_track);

    let mut track: Track<'static> = Vec::with_capacity(piece.track(role).len() + 2);
    let name: &'static str = match role {
        Role::Lead => "Lead",
        Role::Rhythm => "Rhythm",
    };
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    });
    track.extend(piece.track(role).iter().map(note_event));
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}

/// Largest delta a variable-length quantity can carry.
const MAX_DELTA: u32 = (1 << 28) - 1;

/// Multiply every event delta in an SMF by `factor`.
///
/// Scaled deltas are rounded to the nearest tick and saturate at the
/// 28-bit limit. The header, tempo and every event other than its delta
/// are written back unchanged.
pub fn rescale_timing(input: &[u8], factor: f64) -> Result<Vec<u8>, ComposeError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ComposeError::InvalidInput(format!(
            "time change factor must be a positive number, got {factor}"
        )));
    }
    let mut smf = Smf::parse(input).map_err(|e| ComposeError::InvalidMidi(e.to_string()))?;
    for track in &mut smf.tracks {
        for event in track.iter_mut() {
            let scaled = (f64::from(event.delta.as_int()) * factor).round();
            event.delta = u28::new(scaled.min(f64::from(MAX_DELTA)) as u32);
        }
    }
    let mut buf = Vec::new();
    smf.write_std(&mut buf).map_err(ComposeError::MidiIo)?;
    Ok(buf)
}

fn meta_event(event: &MetaEvent) -> TrackEvent<'static> {
    let message = match *event {
        MetaEvent::TimeSignature {
            numerator,
            denominator,
            metronome,
            thirty_seconds,
        } => {
            // SMF stores the denominator as a power of two.
            let power = denominator.max(1).trailing_zeros() as u8;
            MetaMessage::TimeSignature(numerator, power, metronome, thirty_seconds)
        }
        MetaEvent::SetTempo { micros_per_beat } => MetaMessage::Tempo(u24::new(micros_per_beat)),
        MetaEvent::EndOfTrack => MetaMessage::EndOfTrack,
    };
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(message),
    }
}

fn note_event(event: &NoteEvent) -> TrackEvent<'static> {
    let key = u7::new(event.note);
    let vel = u7::new(event.velocity);
    let message = match event.kind {
        NoteKind::NoteOn => MidiMessage::NoteOn { key, vel },
        NoteKind::NoteOff => MidiMessage::NoteOff { key, vel },
    };
    TrackEvent {
        delta: u28::new(event.delta_ticks),
        kind: TrackEventKind::Midi {
            channel: u4::new(event.channel),
            message,
        },
    }
}
