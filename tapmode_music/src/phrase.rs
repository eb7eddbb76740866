// Phrase generators: the musical gestures a bar is built from.
//
// Each generator turns a `PhraseDescriptor` (root pitch, mode, starting
// degree, length in beats) into an ordered run of note events on the
// sixteenth-note grid. The bar composer rolls which gesture plays next from
// a weighted table of `PhrasePattern`s, so all of them share one trait and
// one input contract.
//
// Gestures:
// - runUp / runDown: one scale step per sixteenth
// - arpeggioUp / arpeggioDown: root-third-fifth climbing (see mode.rs)
// - randomNotes: uniform degree per sixteenth, accent on the first note
// - tapping / shiftTapping: a short offset motif anchored on the root,
//   optionally drifting the anchor one step per return
// - variantOnTheme: a fixed motif with random degree and length mutations
// - scaleShuffle: the mode's degrees in a shuffled order, cycled
//
// Every generator fills exactly `beats * 4` sixteenths. Random draws happen
// in the order written below; reordering them changes every seeded piece.

use crate::chance::{WeightedTable, pick, shuffle};
use crate::error::ComposeError;
use crate::event::{NoteEvent, NoteSpec, SIXTEENTH_TICKS, SUBDIVISIONS_PER_BEAT, note_pair};
use crate::mode::{Mode, degree_for_arpeggio_step};
use serde::{Deserialize, Serialize};
use tapmode_prng::MusicRng;

/// Leaps (in scale degrees) a theme note may jump by.
const THEME_LEAPS: [i32; 3] = [2, 4, 7];

/// The uniform input every generator accepts.
#[derive(Debug, Clone, Copy)]
pub struct PhraseDescriptor<'a> {
    /// MIDI pitch of degree 0.
    pub root: i32,
    pub mode: &'a Mode,
    pub start_degree: i32,
    pub beats: u32,
}

impl PhraseDescriptor<'_> {
    /// Number of sixteenth-note steps in the phrase.
    pub fn steps(&self) -> u32 {
        self.beats * SUBDIVISIONS_PER_BEAT
    }
}

/// One note of the theme that `variantOnTheme` mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeNote {
    pub degree: i32,
    pub sixteenths: u32,
}

/// Tables for building tapping motifs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TappingTables {
    /// Motif length in notes.
    pub lengths: WeightedTable<usize>,
    /// Degree offsets from the phrase's start degree.
    pub offsets: WeightedTable<i32>,
}

/// Shared material the generators draw on besides the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseKit {
    pub tapping: TappingTables,
    pub theme: Vec<ThemeNote>,
}

impl Default for PhraseKit {
    fn default() -> Self {
        PhraseKit {
            tapping: TappingTables {
                lengths: WeightedTable::new(vec![(1, 2), (4, 3), (5, 4), (1, 5)]),
                // Heavily biased toward the root.
                offsets: WeightedTable::new(vec![
                    (8, 0),
                    (3, 7),
                    (3, 4),
                    (2, 3),
                    (3, 2),
                    (1, 5),
                    (1, 6),
                ]),
            },
            theme: [(0, 3), (0, 2), (2, 3), (0, 3), (0, 2), (2, 3), (-1, 4)]
                .into_iter()
                .map(|(degree, sixteenths)| ThemeNote { degree, sixteenths })
                .collect(),
        }
    }
}

/// Anything that can turn a descriptor into a run of note events.
pub trait PhraseGenerator {
    /// Tag recorded as the creator of every note this generator emits.
    fn name(&self) -> &str;

    fn generate(
        &self,
        phrase: &PhraseDescriptor<'_>,
        kit: &PhraseKit,
        rng: &mut MusicRng,
    ) -> Result<Vec<NoteEvent>, ComposeError>;
}

/// The built-in gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhrasePattern {
    RunUp,
    RunDown,
    ArpeggioUp,
    ArpeggioDown,
    RandomNotes,
    Tapping,
    ShiftTapping,
    VariantOnTheme,
    ScaleShuffle,
}

impl PhrasePattern {
    pub const ALL: [PhrasePattern; 9] = [
        PhrasePattern::RunUp,
        PhrasePattern::RunDown,
        PhrasePattern::ArpeggioUp,
        PhrasePattern::ArpeggioDown,
        PhrasePattern::RandomNotes,
        PhrasePattern::Tapping,
        PhrasePattern::ShiftTapping,
        PhrasePattern::VariantOnTheme,
        PhrasePattern::ScaleShuffle,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            PhrasePattern::RunUp => "runUp",
            PhrasePattern::RunDown => "runDown",
            PhrasePattern::ArpeggioUp => "arpeggioUp",
            PhrasePattern::ArpeggioDown => "arpeggioDown",
            PhrasePattern::RandomNotes => "randomNotes",
            PhrasePattern::Tapping => "tapping",
            PhrasePattern::ShiftTapping => "shiftTapping",
            PhrasePattern::VariantOnTheme => "variantOnTheme",
            PhrasePattern::ScaleShuffle => "scaleShuffle",
        }
    }
}

impl PhraseGenerator for PhrasePattern {
    fn name(&self) -> &str {
        self.tag()
    }

    fn generate(
        &self,
        phrase: &PhraseDescriptor<'_>,
        kit: &PhraseKit,
        rng: &mut MusicRng,
    ) -> Result<Vec<NoteEvent>, ComposeError> {
        let mut out = PhraseWriter::new(phrase, self.tag());
        match self {
            PhrasePattern::RunUp => run(&mut out, phrase, 1, rng)?,
            PhrasePattern::RunDown => run(&mut out, phrase, -1, rng)?,
            PhrasePattern::ArpeggioUp => arpeggio(&mut out, phrase, 1, rng)?,
            PhrasePattern::ArpeggioDown => arpeggio(&mut out, phrase, -1, rng)?,
            PhrasePattern::RandomNotes => random_notes(&mut out, phrase, rng)?,
            PhrasePattern::Tapping => tapping(&mut out, phrase, kit, 0, rng)?,
            PhrasePattern::ShiftTapping => {
                let direction = if rng.roll(2) == 0 { -1 } else { 1 };
                tapping(&mut out, phrase, kit, direction, rng)?
            }
            PhrasePattern::VariantOnTheme => variant_on_theme(&mut out, phrase, kit, rng)?,
            PhrasePattern::ScaleShuffle => scale_shuffle(&mut out, phrase, rng)?,
        }
        Ok(out.events)
    }
}

/// Collects note pairs tagged with the generator and mode names.
struct PhraseWriter<'a> {
    creator: &'a str,
    mode: &'a str,
    events: Vec<NoteEvent>,
}

impl<'a> PhraseWriter<'a> {
    fn new(phrase: &PhraseDescriptor<'a>, creator: &'a str) -> Self {
        PhraseWriter {
            creator,
            mode: phrase.mode.name(),
            events: Vec::with_capacity(phrase.steps() as usize * 2),
        }
    }

    fn note(&mut self, pitch: i32, length_ticks: u32, velocity: u32) -> Result<(), ComposeError> {
        let spec = NoteSpec::new(pitch, self.creator)
            .length(length_ticks)
            .velocity(velocity)
            .mode(self.mode);
        self.events.extend(note_pair(spec)?);
        Ok(())
    }

    fn sixteenth(&mut self, pitch: i32, velocity: u32) -> Result<(), ComposeError> {
        self.note(pitch, SIXTEENTH_TICKS, velocity)
    }
}

/// `48..=79`, plus 32 on the first sixteenth of each beat.
fn step_velocity(rng: &mut MusicRng, step: u32) -> u32 {
    let accent = if step % SUBDIVISIONS_PER_BEAT == 0 { 32 } else { 0 };
    rng.roll(32) as u32 + 48 + accent
}

/// `48..=79`, plus 32 on the first note of the phrase only.
fn phrase_velocity(rng: &mut MusicRng, index: usize) -> u32 {
    let accent = if index == 0 { 32 } else { 0 };
    rng.roll(32) as u32 + 48 + accent
}

fn run(
    out: &mut PhraseWriter<'_>,
    phrase: &PhraseDescriptor<'_>,
    direction: i32,
    rng: &mut MusicRng,
) -> Result<(), ComposeError> {
    for step in 0..phrase.steps() {
        let degree = phrase.start_degree + direction * step as i32;
        let pitch = phrase.mode.midi_pitch(phrase.root, degree)?;
        out.sixteenth(pitch, step_velocity(rng, step))?;
    }
    Ok(())
}

fn arpeggio(
    out: &mut PhraseWriter<'_>,
    phrase: &PhraseDescriptor<'_>,
    direction: i32,
    rng: &mut MusicRng,
) -> Result<(), ComposeError> {
    let per_beat = SUBDIVISIONS_PER_BEAT;
    for step in 0..phrase.steps() {
        // 0 1 2 3 1 2 3 4 2 3 4 5 ... (negated going down)
        let arp_step = (step % per_beat + step / per_beat) as i32 * direction;
        let degree =
            degree_for_arpeggio_step(phrase.mode.degree_count(), phrase.start_degree, arp_step);
        let pitch = phrase.mode.midi_pitch(phrase.root, degree)?;
        out.sixteenth(pitch, step_velocity(rng, step))?;
    }
    Ok(())
}

fn random_notes(
    out: &mut PhraseWriter<'_>,
    phrase: &PhraseDescriptor<'_>,
    rng: &mut MusicRng,
) -> Result<(), ComposeError> {
    let degree_count = phrase.mode.degree_count();
    for step in 0..phrase.steps() {
        let degree = rng.roll_usize(degree_count) as i32;
        let pitch = phrase.mode.midi_pitch(phrase.root, degree)?;
        out.sixteenth(pitch, phrase_velocity(rng, step as usize))?;
    }
    Ok(())
}

/// Roll a tapping motif: offsets from the start degree, never the same
/// offset twice in a row, always containing the root (offset 0).
fn tapping_motif(
    tables: &TappingTables,
    steps: usize,
    rng: &mut MusicRng,
) -> Result<Vec<i32>, ComposeError> {
    let len = *tables.lengths.roll(rng, "tap pattern lengths")?;
    if len == 0 {
        return Err(ComposeError::InvalidConfig(
            "tap pattern lengths must be positive".into(),
        ));
    }
    let mut distinct: Vec<i32> = tables.offsets.positive_payloads().copied().collect();
    distinct.sort_unstable();
    distinct.dedup();
    if len > 1 && distinct.len() < 2 {
        return Err(ComposeError::InvalidConfig(
            "tap offsets need at least two distinct drawable values".into(),
        ));
    }

    let mut motif = Vec::with_capacity(len);
    while motif.len() < len {
        let offset = *tables.offsets.roll(rng, "tap offsets")?;
        if motif.last() != Some(&offset) {
            motif.push(offset);
        }
    }

    if !motif.contains(&0) {
        motif.pop();
        motif.insert(0, 0);
    }
    // A phrase shorter than the motif must still reach the root.
    if let Some(first_root) = motif.iter().position(|&o| o == 0) {
        if first_root >= steps {
            motif.rotate_left(first_root);
        }
    }
    Ok(motif)
}

fn tapping(
    out: &mut PhraseWriter<'_>,
    phrase: &PhraseDescriptor<'_>,
    kit: &PhraseKit,
    direction: i32,
    rng: &mut MusicRng,
) -> Result<(), ComposeError> {
    let steps = phrase.steps();
    let motif = tapping_motif(&kit.tapping, steps as usize, rng)?;

    // The first return to the root sounds the root itself; each later
    // return drifts one more step in `direction`.
    let mut drift = 0;
    let mut previous: Option<i32> = None;
    for step in 0..steps {
        let mut offset = motif[step as usize % motif.len()];
        if offset == 0 {
            offset += drift;
            drift += direction;
        }
        let mut pitch = phrase.mode.midi_pitch(phrase.root, phrase.start_degree + offset)?;
        if previous == Some(pitch) {
            pitch += 12;
        }
        out.sixteenth(pitch, step_velocity(rng, step))?;
        previous = Some(pitch);
    }
    Ok(())
}

fn variant_on_theme(
    out: &mut PhraseWriter<'_>,
    phrase: &PhraseDescriptor<'_>,
    kit: &PhraseKit,
    rng: &mut MusicRng,
) -> Result<(), ComposeError> {
    if kit.theme.is_empty() {
        return Err(ComposeError::InvalidConfig("theme is empty".into()));
    }
    let last = kit.theme.len() - 1;
    let mut remaining = phrase.steps() * SIXTEENTH_TICKS;

    for (i, note) in kit.theme.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        let mut degree = note.degree;
        let mut length = note.sixteenths.max(1).saturating_mul(SIXTEENTH_TICKS);

        if i != 0 && rng.roll(3) == 0 {
            let sign = if rng.roll(2) == 0 { -1 } else { 1 };
            if rng.roll(4) == 0 {
                degree += sign;
            } else {
                degree += sign * *pick(rng, &THEME_LEAPS, "theme leaps")?;
            }
        }
        if i != 0 && rng.roll(3) == 0 {
            let shorter = rng.roll(2) == 0;
            let amount = (if rng.roll(3) == 0 { 2 } else { 1 }) * SIXTEENTH_TICKS;
            length = if shorter {
                length.saturating_sub(amount)
            } else {
                length + amount
            };
        }
        length = length.max(SIXTEENTH_TICKS).min(remaining);
        if i == last {
            length = remaining;
        }
        remaining -= length;

        let pitch = phrase.mode.midi_pitch(phrase.root, phrase.start_degree + degree)?;
        out.note(pitch, length, phrase_velocity(rng, i))?;
    }
    Ok(())
}

fn scale_shuffle(
    out: &mut PhraseWriter<'_>,
    phrase: &PhraseDescriptor<'_>,
    rng: &mut MusicRng,
) -> Result<(), ComposeError> {
    let order = shuffle(rng, (0..phrase.mode.degree_count() as i32).collect());
    for step in 0..phrase.steps() {
        let degree = phrase.start_degree + order[step as usize % order.len()];
        let pitch = phrase.mode.midi_pitch(phrase.root, degree)?;
        out.sixteenth(pitch, step_velocity(rng, step))?;
    }
    Ok(())
}
