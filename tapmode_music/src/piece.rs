// Piece composer: sections, modes, roots, and the two output tracks.
//
// A piece is `section_count` sections of `bars_per_section` bars. Before the
// first section the composer settles the piece root and the home mode; each
// section then picks its mode (by default never the same as the previous
// section's, except that the last section always returns home), its root
// offset from the piece root, and one motif-root degree per bar. Bars are
// filled by `bar::compose_bar` for the lead line and by a steady eighth-note
// pulse for the rhythm line. The last section may close with a long cadence
// note.
//
// Everything is driven by one `MusicRng` seeded from the request's seed
// string and threaded through in a fixed order:
//
//   piece root, home mode,
//   per section: mode, root interval, progression octave, bar degrees,
//                then per bar: lead octave, the bar's phrases
//
// so the same seed, request and config always produce identical tracks.
//
// See also: `config.rs` for the policies consulted here, `midi.rs` for
// turning a `Piece` into a Standard MIDI File.

use crate::bar::{BarRequest, PhraseRecord, compose_bar};
use crate::chance::pick;
use crate::config::{BarDegrees, CompositionConfig, ModeFlow, PieceRoot, SectionRoots};
use crate::error::ComposeError;
use crate::event::{
    DEFAULT_VELOCITY, MetaEvent, NoteEvent, NoteSpec, SIXTEENTH_TICKS, TICKS_PER_BEAT, meta_track,
    note_pair, validate_events,
};
use crate::mode::{Mode, pitch_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tapmode_prng::MusicRng;
use tracing::info;

/// Velocity of the first eighth note of each rhythm bar.
const RHYTHM_ACCENT: u32 = 80;

/// Which melodic line a caller wants rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Rhythm,
    Lead,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Rhythm => "rhythm",
            Role::Lead => "lead",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rhythm" => Ok(Role::Rhythm),
            "lead" => Ok(Role::Lead),
            other => Err(ComposeError::InvalidInput(format!(
                "role must be 'rhythm' or 'lead', got '{other}'"
            ))),
        }
    }
}

/// What to compose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceRequest {
    pub seed: String,
    pub section_count: u32,
    pub bars_per_section: u32,
}

impl PieceRequest {
    pub const DEFAULT_BARS_PER_SECTION: u32 = 4;

    pub fn new(seed: impl Into<String>, section_count: u32) -> Self {
        PieceRequest {
            seed: seed.into(),
            section_count,
            bars_per_section: Self::DEFAULT_BARS_PER_SECTION,
        }
    }

    pub fn bars_per_section(mut self, bars: u32) -> Self {
        self.bars_per_section = bars;
        self
    }

    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.seed.is_empty() {
            return Err(ComposeError::InvalidInput("seed must not be empty".into()));
        }
        if self.section_count == 0 {
            return Err(ComposeError::InvalidInput("section count must be at least 1".into()));
        }
        if self.bars_per_section == 0 {
            return Err(ComposeError::InvalidInput("bars per section must be at least 1".into()));
        }
        Ok(())
    }
}

/// One bar's plan: its motif-root degree and the phrases that filled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarPlan {
    pub degree: i32,
    /// Octaves the lead was shifted for this bar on top of the section's
    /// lead root.
    pub octave: i32,
    pub phrases: Vec<PhraseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPlan {
    /// MIDI pitch of the section's tonal centre, before any octave shift
    /// for the lead or rhythm line.
    pub root: i32,
    pub mode: Mode,
    /// Root of the lead line in this section.
    pub lead_root: i32,
    pub bars: Vec<BarPlan>,
}

/// A composed piece: the plan plus the meta, lead and rhythm tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub seed: String,
    pub beats_per_bar: u32,
    pub sections: Vec<SectionPlan>,
    pub meta: Vec<MetaEvent>,
    pub lead: Vec<NoteEvent>,
    pub rhythm: Vec<NoteEvent>,
    /// Pitch of the lead line's closing note, when the config has one.
    pub cadence_pitch: Option<u8>,
}

impl Piece {
    pub fn track(&self, role: Role) -> &[NoteEvent] {
        match role {
            Role::Lead => &self.lead,
            Role::Rhythm => &self.rhythm,
        }
    }

    pub fn section_modes(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.mode.name()).collect()
    }
}

/// Compose a whole piece.
pub fn compose_piece(
    request: &PieceRequest,
    config: &CompositionConfig,
) -> Result<Piece, ComposeError> {
    request.validate()?;
    config.validate(request.section_count)?;

    let mut rng = MusicRng::from_seed_str(&request.seed);
    let section_count = request.section_count as usize;
    let bars_per_section = request.bars_per_section as usize;

    let piece_root = match config.piece_root {
        PieceRoot::Fixed(root) => root,
        PieceRoot::Rolled => rng.roll(12) as i32,
    };
    let home = match config.resolve_home_mode()? {
        Some(mode) => mode,
        None => config.section_modes.roll(&mut rng, "section modes")?.clone(),
    };
    info!(
        seed = %request.seed,
        sections = section_count,
        bars_per_section,
        home = home.name(),
        root = piece_root,
        "composing piece"
    );

    let mut sections = Vec::with_capacity(section_count);
    let mut lead = Vec::new();
    let mut rhythm = Vec::new();
    let mut cadence_pitch = None;
    let mut current: Option<Mode> = None;

    for s in 0..section_count {
        let last = s + 1 == section_count;
        let mode = match config.mode_flow {
            ModeFlow::ContrastThenHome if last && s > 0 => home.clone(),
            ModeFlow::ContrastThenHome => section_mode(config, current.as_ref(), &mut rng)?,
            ModeFlow::Independent => config.section_modes.roll(&mut rng, "section modes")?.clone(),
        };
        current = Some(mode.clone());

        let interval = match &config.section_roots {
            SectionRoots::HomeModeInterval => {
                *pick(&mut rng, home.intervals(), "home mode intervals")?
            }
            SectionRoots::Cycle(cycle) => cycle[s % cycle.len()],
            SectionRoots::Rolled { jitter } => {
                let jitter = rng.roll(u64::from(*jitter)) as i32;
                jitter + rng.roll(12) as i32
            }
        };
        let root = piece_root + interval + 12 * config.section_octave;
        let progression = if config.progression_octaves > 1 {
            rng.roll(config.progression_octaves as u64) as i32
        } else {
            0
        };
        let lead_root = root + 12 * (config.lead_octave + progression);
        let degrees = bar_degrees(&config.bar_degrees, bars_per_section, &mut rng)?;
        info!(
            section = s,
            mode = mode.name(),
            root = %pitch_label(root),
            ?degrees,
            "section"
        );

        let mut bars = Vec::with_capacity(bars_per_section);
        for (b, &degree) in degrees.iter().enumerate() {
            let octave = if config.bar_octaves > 1 {
                rng.roll(u64::from(config.bar_octaves)) as i32
            } else {
                0
            };
            let bar_request = BarRequest {
                root: lead_root + 12 * octave,
                mode: &mode,
                degree,
                index: s * bars_per_section + b,
            };
            let bar = compose_bar(&bar_request, config, &mut rng)?;
            lead.extend(bar.events);
            rhythm.extend(rhythm_bar(
                root + 12 * config.rhythm_octave,
                &mode,
                degree,
                config.beats_per_bar,
            )?);
            bars.push(BarPlan {
                degree,
                octave,
                phrases: bar.phrases,
            });
        }

        if let Some(cadence) = config.cadence.filter(|_| last) {
            let length = cadence.sixteenths * SIXTEENTH_TICKS;
            let lead_spec = NoteSpec::new(cadence.pitch(root), "cadence")
                .length(length)
                .mode(mode.name());
            let [on, off] = note_pair(lead_spec)?;
            cadence_pitch = Some(on.note);
            lead.extend([on, off]);
            let rhythm_root = root + 12 * (config.rhythm_octave - cadence.octaves);
            let rhythm_spec = NoteSpec::new(cadence.pitch(rhythm_root), "cadence")
                .length(length)
                .mode(mode.name());
            rhythm.extend(note_pair(rhythm_spec)?);
        }

        sections.push(SectionPlan {
            root,
            mode,
            lead_root,
            bars,
        });
    }

    validate_events(&lead)?;
    validate_events(&rhythm)?;
    info!(
        lead_events = lead.len(),
        rhythm_events = rhythm.len(),
        "piece composed"
    );

    Ok(Piece {
        seed: request.seed.clone(),
        beats_per_bar: config.beats_per_bar,
        sections,
        meta: meta_track(config.beats_per_bar, config.micros_per_beat),
        lead,
        rhythm,
        cadence_pitch,
    })
}

/// Roll a section mode, rerolling until its name differs from `current`.
fn section_mode(
    config: &CompositionConfig,
    current: Option<&Mode>,
    rng: &mut MusicRng,
) -> Result<Mode, ComposeError> {
    loop {
        let mode = config.section_modes.roll(rng, "section modes")?;
        if current.is_none_or(|c| c.name() != mode.name()) {
            return Ok(mode.clone());
        }
    }
}

fn bar_degrees(
    policy: &BarDegrees,
    bars: usize,
    rng: &mut MusicRng,
) -> Result<Vec<i32>, ComposeError> {
    match policy {
        BarDegrees::Tonic => Ok(vec![0; bars]),
        BarDegrees::Firmus {
            first,
            last,
            interior_span,
        } => (0..bars)
            .map(|b| {
                if b == 0 {
                    first.roll(rng, "first bar degrees").copied()
                } else if b + 1 == bars {
                    last.roll(rng, "last bar degrees").copied()
                } else {
                    Ok(rng.roll(*interior_span as u64) as i32)
                }
            })
            .collect(),
    }
}

/// Steady eighth notes on the bar's degree, accented on the downbeat.
fn rhythm_bar(
    root: i32,
    mode: &Mode,
    degree: i32,
    beats_per_bar: u32,
) -> Result<Vec<NoteEvent>, ComposeError> {
    let pitch = mode.midi_pitch(root, degree)?;
    let eighth = TICKS_PER_BEAT / 2;
    let mut events = Vec::with_capacity(beats_per_bar as usize * 4);
    for i in 0..beats_per_bar * 2 {
        let velocity = if i == 0 {
            RHYTHM_ACCENT
        } else {
            DEFAULT_VELOCITY as u32
        };
        let spec = NoteSpec::new(pitch, "rhythm")
            .length(eighth)
            .velocity(velocity)
            .mode(mode.name());
        events.extend(note_pair(spec)?);
    }
    Ok(events)
}

fn pitch_label(pitch: i32) -> String {
    match u8::try_from(pitch) {
        Ok(p) if p <= 127 => format!("{} ({p})", pitch_name(p)),
        _ => pitch.to_string(),
    }
}
