// Data-driven composition configuration.
//
// Every table and policy the composer consults lives in `CompositionConfig`:
// which modes sections may use and how often, where the piece's tonal
// centre sits, how bars pick their motif root, how long phrases are and
// which gestures fill them, and how the piece closes. The composer itself
// holds no tables of its own, so different styles are different config
// values rather than different code paths.
//
// Configs load from JSON (`CompositionConfig::load`) or come from the named
// presets (`pressure`, `variants`, `micromodes`). `validate` runs before any
// randomness is consumed and rejects everything that would otherwise fail
// halfway through a piece: empty tables, unknown home modes, a mode reroll
// that could never find a different mode, and octave or length values large
// enough to overflow pitch and tick arithmetic.
//
// See also: `piece.rs` for the order in which these policies draw from the
// RNG, `bar.rs` for the phrase-filling loop, `phrase.rs` for `PhraseKit`.

use crate::chance::WeightedTable;
use crate::error::ComposeError;
use crate::mode::Mode;
use crate::phrase::{PhraseKit, PhrasePattern};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tapmode_prng::MusicRng;

/// Largest octave shift any policy may apply.
pub const MAX_OCTAVES: i32 = 10;
/// Largest semitone offset for roots and root cycles.
pub const MAX_SEMITONES: i32 = 127;
/// Largest degree offset in bar, tapping and theme tables.
pub const MAX_DEGREE: i32 = 64;
/// Longest bar, phrase or tapping motif.
pub const MAX_BEATS: u32 = 64;
/// Longest theme note or cadence.
pub const MAX_SIXTEENTHS: u32 = 1024;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How section modes follow one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeFlow {
    /// Each section rerolls until its mode differs from the previous
    /// section's; the final section returns to the home mode.
    #[default]
    ContrastThenHome,
    /// Every section rolls its mode on its own.
    Independent,
}

/// The mode the final section returns to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeMode {
    /// A mode from the section table (by name) or a church mode.
    Named(String),
    /// Rolled once from the section mode table before the first section.
    Rolled,
}

/// Pitch class of the piece's tonal centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceRoot {
    Fixed(i32),
    /// Uniform over the twelve pitch classes.
    Rolled,
}

/// How each section's root is offset from the piece root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionRoots {
    /// A uniformly picked interval of the home mode.
    HomeModeInterval,
    /// Semitone offsets cycled by section index.
    Cycle(Vec<i32>),
    /// `roll(jitter)` semitones plus a rolled pitch class, per section.
    Rolled { jitter: u32 },
}

/// How each bar's motif-root degree is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarDegrees {
    /// Every bar starts on degree 0.
    Tonic,
    /// Cantus-firmus style: dedicated tables for the first and last bar of a
    /// section, uniform over `0..interior_span` elsewhere.
    Firmus {
        first: WeightedTable<i32>,
        last: WeightedTable<i32>,
        interior_span: u32,
    },
}

/// Where each phrase starts relative to its bar's motif-root degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseStart {
    #[default]
    BarDegree,
    /// The bar degree plus a degree rolled over one octave of the mode
    /// (`0..=degree_count`), drawn per phrase.
    RolledDegree,
}

/// How the next phrase gesture is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSelection {
    /// Rolled per phrase.
    Table(WeightedTable<PhrasePattern>),
    /// Fixed per bar: the piece-wide bar index picks the entry (wrapping).
    Sequence(Vec<PhrasePattern>),
}

impl PatternSelection {
    /// The gesture for the next phrase of bar `bar_index`. Only the table
    /// form draws from `rng`.
    pub fn choose(
        &self,
        bar_index: usize,
        rng: &mut MusicRng,
    ) -> Result<PhrasePattern, ComposeError> {
        match self {
            PatternSelection::Table(table) => table.roll(rng, "phrase patterns").copied(),
            PatternSelection::Sequence(seq) => seq
                .get(bar_index % seq.len().max(1))
                .copied()
                .ok_or_else(|| ComposeError::InvalidConfig("pattern sequence is empty".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceInterval {
    Tonic,
    /// A perfect fifth above the section root.
    Fifth,
}

/// The long closing note appended after the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    pub interval: CadenceInterval,
    /// Octaves above the final section's root.
    pub octaves: i32,
    pub sixteenths: u32,
}

impl Cadence {
    pub fn pitch(&self, section_root: i32) -> i32 {
        let interval = match self.interval {
            CadenceInterval::Tonic => 0,
            CadenceInterval::Fifth => 7,
        };
        section_root + 12 * self.octaves + interval
    }
}

// ---------------------------------------------------------------------------
// CompositionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionConfig {
    pub beats_per_bar: u32,
    /// Tempo for the meta track.
    pub micros_per_beat: u32,
    pub section_modes: WeightedTable<Mode>,
    #[serde(default)]
    pub mode_flow: ModeFlow,
    pub home_mode: HomeMode,
    pub piece_root: PieceRoot,
    pub section_roots: SectionRoots,
    /// Octaves added to every section root.
    pub section_octave: i32,
    /// Octaves from the section root to the lead line's root.
    pub lead_octave: i32,
    /// When above 1, each section rolls `0..progression_octaves` extra
    /// octaves for its lead root.
    pub progression_octaves: u32,
    /// When above 1, each lead bar rolls `0..bar_octaves` extra octaves.
    #[serde(default)]
    pub bar_octaves: u32,
    /// Octaves from the section root to the rhythm pulse.
    pub rhythm_octave: i32,
    pub bar_degrees: BarDegrees,
    /// Phrase lengths in beats, clipped to what is left of the bar.
    pub phrase_lengths: WeightedTable<u32>,
    #[serde(default)]
    pub phrase_start: PhraseStart,
    pub patterns: PatternSelection,
    /// A phrase that fits again is repeated on a 0 from `roll(repeat_one_in)`.
    /// 0 disables repetition.
    pub repeat_one_in: u32,
    pub kit: PhraseKit,
    /// Closing note; `None` ends the piece on its last bar.
    #[serde(default)]
    pub cadence: Option<Cadence>,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        CompositionConfig::pressure()
    }
}

fn church(name: &str) -> Mode {
    // Catalogue names are fixed, so the lookup cannot fail.
    Mode::church(name).unwrap_or_else(|_| unreachable!("church mode {name} missing"))
}

impl CompositionConfig {
    /// 4/4 riffs in Aeolian and Phrygian over a root/fifth section cycle:
    /// a fixed per-bar gesture sequence dominated by tapping, bar roots from
    /// cantus-firmus tables, and a tonic cadence.
    pub fn pressure() -> Self {
        use PhrasePattern::*;
        CompositionConfig {
            beats_per_bar: 4,
            micros_per_beat: 1_000_000,
            section_modes: WeightedTable::new(vec![
                (0, church("Ionian")),
                (0, church("Dorian")),
                (1, church("Phrygian")),
                (0, church("Lydian")),
                (0, church("Mixolydian")),
                (7, church("Aeolian")),
                (0, church("Locrian")),
            ]),
            mode_flow: ModeFlow::ContrastThenHome,
            home_mode: HomeMode::Named("Aeolian".into()),
            piece_root: PieceRoot::Fixed(2),
            section_roots: SectionRoots::Cycle(vec![0, 0, 7, 0]),
            section_octave: 1,
            lead_octave: 4,
            progression_octaves: 1,
            bar_octaves: 1,
            rhythm_octave: 2,
            bar_degrees: BarDegrees::Firmus {
                first: WeightedTable::new(vec![(1, 0), (1, 4)]),
                last: WeightedTable::new(vec![(2, 0), (1, 4)]),
                interior_span: 8,
            },
            phrase_lengths: WeightedTable::new(vec![(0, 1), (0, 2), (1, 4)]),
            phrase_start: PhraseStart::BarDegree,
            patterns: PatternSelection::Sequence(vec![
                RandomNotes,
                RandomNotes,
                Tapping,
                Tapping,
                Tapping,
                Tapping,
                Tapping,
                ShiftTapping,
                ShiftTapping,
                ShiftTapping,
                ShiftTapping,
                ArpeggioUp,
                ArpeggioUp,
                Tapping,
                ShiftTapping,
                Tapping,
            ]),
            repeat_one_in: 3,
            kit: PhraseKit::default(),
            cadence: Some(Cadence {
                interval: CadenceInterval::Tonic,
                octaves: 5,
                sixteenths: 16,
            }),
        }
    }

    /// 5/4 variations: a rolled home mode and piece root, short phrases
    /// mostly spent mutating the theme, and a cadence on the fifth.
    pub fn variants() -> Self {
        use PhrasePattern::*;
        CompositionConfig {
            beats_per_bar: 5,
            micros_per_beat: 1_000_000,
            section_modes: WeightedTable::new(vec![
                (0, church("Ionian")),
                (6, church("Dorian")),
                (2, church("Phrygian")),
                (0, church("Lydian")),
                (0, church("Mixolydian")),
                (0, church("Aeolian")),
                (2, church("Locrian")),
            ]),
            mode_flow: ModeFlow::ContrastThenHome,
            home_mode: HomeMode::Rolled,
            piece_root: PieceRoot::Rolled,
            section_roots: SectionRoots::HomeModeInterval,
            section_octave: 1,
            lead_octave: 2,
            progression_octaves: 2,
            bar_octaves: 1,
            rhythm_octave: 1,
            bar_degrees: BarDegrees::Tonic,
            phrase_lengths: WeightedTable::new(vec![(3, 1), (5, 2), (1, 4)]),
            phrase_start: PhraseStart::BarDegree,
            patterns: PatternSelection::Table(WeightedTable::new(vec![
                (0, RunUp),
                (0, RunDown),
                (1, ArpeggioUp),
                (1, ArpeggioDown),
                (2, RandomNotes),
                (8, VariantOnTheme),
            ])),
            repeat_one_in: 3,
            kit: PhraseKit::default(),
            cadence: Some(Cadence {
                interval: CadenceInterval::Fifth,
                octaves: 2,
                sixteenths: 16,
            }),
        }
    }

    /// 4/4 one-beat gestures: every section picks any church mode and a
    /// fresh root, each lead bar jumps to a rolled octave, phrases start on
    /// a rolled degree, and the piece stops without a cadence.
    pub fn micromodes() -> Self {
        use PhrasePattern::*;
        CompositionConfig {
            beats_per_bar: 4,
            micros_per_beat: 1_000_000,
            section_modes: WeightedTable::uniform(Mode::church_modes()),
            mode_flow: ModeFlow::Independent,
            home_mode: HomeMode::Named("Ionian".into()),
            piece_root: PieceRoot::Fixed(24),
            section_roots: SectionRoots::Rolled { jitter: 3 },
            section_octave: 0,
            lead_octave: 1,
            progression_octaves: 1,
            bar_octaves: 4,
            rhythm_octave: 2,
            bar_degrees: BarDegrees::Firmus {
                first: WeightedTable::new(vec![(1, 0), (1, 4)]),
                last: WeightedTable::new(vec![(2, 0), (1, 4)]),
                interior_span: 8,
            },
            phrase_lengths: WeightedTable::new(vec![(1, 1)]),
            phrase_start: PhraseStart::RolledDegree,
            patterns: PatternSelection::Table(WeightedTable::new(vec![
                (2, RunUp),
                (2, RunDown),
                (1, ArpeggioUp),
                (1, ArpeggioDown),
                (8, RandomNotes),
            ])),
            repeat_one_in: 0,
            kit: PhraseKit::default(),
            cadence: None,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Result<Self, ComposeError> {
        match name.to_ascii_lowercase().as_str() {
            "pressure" => Ok(CompositionConfig::pressure()),
            "variants" => Ok(CompositionConfig::variants()),
            "micromodes" => Ok(CompositionConfig::micromodes()),
            _ => Err(ComposeError::InvalidConfig(format!("unknown preset '{name}'"))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ComposeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ComposeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The configured home mode, or `None` when it is rolled per piece.
    pub fn resolve_home_mode(&self) -> Result<Option<Mode>, ComposeError> {
        match &self.home_mode {
            HomeMode::Rolled => Ok(None),
            HomeMode::Named(name) => {
                let from_table = self
                    .section_modes
                    .entries()
                    .iter()
                    .map(|(_, m)| m)
                    .find(|m| m.name().eq_ignore_ascii_case(name));
                match from_table {
                    Some(mode) => Ok(Some(mode.clone())),
                    None => Mode::church(name).map(Some),
                }
            }
        }
    }

    /// Reject configurations that cannot compose `section_count` sections.
    pub fn validate(&self, section_count: u32) -> Result<(), ComposeError> {
        let invalid = |msg: &str| Err(ComposeError::InvalidConfig(msg.to_string()));

        if self.beats_per_bar == 0 || self.beats_per_bar > MAX_BEATS {
            return invalid("beats_per_bar must be in 1..=64");
        }
        if self.micros_per_beat == 0 || self.micros_per_beat > 0xFF_FFFF {
            return invalid("micros_per_beat must fit in 24 bits and be positive");
        }
        if self.section_modes.total_weight() == 0 {
            return invalid("section mode table has no drawable mode");
        }
        self.resolve_home_mode()?;
        if section_count >= 3 && self.mode_flow == ModeFlow::ContrastThenHome {
            let mut names: Vec<&str> = self
                .section_modes
                .positive_payloads()
                .map(|m| m.name())
                .collect();
            names.sort_unstable();
            names.dedup();
            if names.len() < 2 {
                return invalid(
                    "interior sections need at least two drawable modes to avoid repeats",
                );
            }
        }
        self.validate_ranges()?;
        match &self.section_roots {
            SectionRoots::Cycle(cycle) if cycle.is_empty() => {
                return invalid("section root cycle is empty");
            }
            SectionRoots::Rolled { jitter } if *jitter == 0 || *jitter > 12 => {
                return invalid("rolled section roots need a jitter in 1..=12");
            }
            _ => {}
        }
        if let BarDegrees::Firmus {
            first,
            last,
            interior_span,
        } = &self.bar_degrees
        {
            if first.total_weight() == 0 || last.total_weight() == 0 || *interior_span == 0 {
                return invalid("firmus tables need drawable degrees and a positive interior span");
            }
        }
        if self.phrase_lengths.total_weight() == 0
            || self.phrase_lengths.positive_payloads().any(|&b| b == 0)
        {
            return invalid("phrase lengths need drawable, positive beat counts");
        }
        match &self.patterns {
            PatternSelection::Table(table) if table.total_weight() == 0 => {
                return invalid("pattern table has no drawable pattern");
            }
            PatternSelection::Sequence(seq) if seq.is_empty() => {
                return invalid("pattern sequence is empty");
            }
            _ => {}
        }
        let tapping = &self.kit.tapping;
        if tapping.lengths.total_weight() == 0
            || tapping.lengths.positive_payloads().any(|&l| l == 0)
        {
            return invalid("tap pattern lengths need drawable, positive lengths");
        }
        let mut offsets: Vec<i32> = tapping.offsets.positive_payloads().copied().collect();
        offsets.sort_unstable();
        offsets.dedup();
        if offsets.len() < 2 {
            return invalid("tap offsets need at least two distinct drawable values");
        }
        if self.kit.theme.is_empty() {
            return invalid("theme is empty");
        }
        if let Some(cadence) = &self.cadence {
            if cadence.sixteenths == 0 {
                return invalid("cadence must last at least one sixteenth");
            }
        }
        Ok(())
    }

    /// Bounds on every value that feeds pitch or tick arithmetic.
    fn validate_ranges(&self) -> Result<(), ComposeError> {
        let out_of_range = |what: &str, value: i64, max: i64| {
            if value.abs() > max {
                Err(ComposeError::InvalidConfig(format!(
                    "{what} is {value}, outside -{max}..={max}"
                )))
            } else {
                Ok(())
            }
        };
        let octaves = i64::from(MAX_OCTAVES);
        let semitones = i64::from(MAX_SEMITONES);
        let degrees = i64::from(MAX_DEGREE);

        out_of_range("section_octave", self.section_octave.into(), octaves)?;
        out_of_range("lead_octave", self.lead_octave.into(), octaves)?;
        out_of_range("rhythm_octave", self.rhythm_octave.into(), octaves)?;
        out_of_range("progression_octaves", self.progression_octaves.into(), octaves)?;
        out_of_range("bar_octaves", self.bar_octaves.into(), octaves)?;
        if let PieceRoot::Fixed(root) = self.piece_root {
            out_of_range("piece_root", root.into(), semitones)?;
        }
        if let SectionRoots::Cycle(cycle) = &self.section_roots {
            for &interval in cycle {
                out_of_range("section root interval", interval.into(), semitones)?;
            }
        }
        if let BarDegrees::Firmus {
            first,
            last,
            interior_span,
        } = &self.bar_degrees
        {
            for &(_, degree) in first.entries().iter().chain(last.entries()) {
                out_of_range("firmus degree", degree.into(), degrees)?;
            }
            out_of_range("interior_span", (*interior_span).into(), degrees)?;
        }
        for &(_, beats) in self.phrase_lengths.entries() {
            out_of_range("phrase length", beats.into(), MAX_BEATS.into())?;
        }
        for &(_, len) in self.kit.tapping.lengths.entries() {
            out_of_range("tap pattern length", len as i64, MAX_BEATS.into())?;
        }
        for &(_, offset) in self.kit.tapping.offsets.entries() {
            out_of_range("tap offset", offset.into(), degrees)?;
        }
        for note in &self.kit.theme {
            out_of_range("theme degree", note.degree.into(), degrees)?;
            out_of_range("theme note length", note.sixteenths.into(), MAX_SIXTEENTHS.into())?;
        }
        if let Some(cadence) = &self.cadence {
            out_of_range("cadence octaves", cadence.octaves.into(), octaves)?;
            out_of_range("cadence length", cadence.sixteenths.into(), MAX_SIXTEENTHS.into())?;
        }
        Ok(())
    }
}
