// Bar composer: fills one bar's beat budget with phrases.
//
// A bar is built left to right. Each iteration rolls a phrase length from
// the config (clipped to what is left of the bar), chooses a gesture, and
// asks that gesture for exactly that many beats of notes rooted on the
// bar's motif-root degree (or, with `PhraseStart::RolledDegree`, on a degree
// rolled above it). A phrase that fits again in the remaining space
// may be repeated verbatim, which is what gives the riffs their call-and-
// echo shape.
//
// The finished bar is checked with `validate_events` before it is handed
// back, so a track is only ever extended by well-formed bars.

use crate::config::{CompositionConfig, PhraseStart};
use crate::error::ComposeError;
use crate::event::{NoteEvent, validate_events};
use crate::mode::Mode;
use crate::phrase::{PhraseDescriptor, PhraseGenerator, PhrasePattern};
use serde::{Deserialize, Serialize};
use tapmode_prng::MusicRng;
use tracing::debug;

/// Where and how a bar sits in the piece.
#[derive(Debug, Clone, Copy)]
pub struct BarRequest<'a> {
    /// MIDI pitch of degree 0 for the lead line.
    pub root: i32,
    pub mode: &'a Mode,
    /// Motif-root degree every phrase in the bar starts from.
    pub degree: i32,
    /// Bar index counted across the whole piece.
    pub index: usize,
}

/// One phrase as it landed in the bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRecord {
    pub pattern: PhrasePattern,
    pub beats: u32,
    /// The phrase was played twice in a row.
    pub repeated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ComposedBar {
    pub events: Vec<NoteEvent>,
    pub phrases: Vec<PhraseRecord>,
}

impl ComposedBar {
    /// Beats covered, counting repeats twice.
    pub fn beats(&self) -> u32 {
        self.phrases
            .iter()
            .map(|p| if p.repeated { p.beats * 2 } else { p.beats })
            .sum()
    }
}

pub fn compose_bar(
    request: &BarRequest<'_>,
    config: &CompositionConfig,
    rng: &mut MusicRng,
) -> Result<ComposedBar, ComposeError> {
    let beats_per_bar = config.beats_per_bar;
    let mut bar = ComposedBar::default();
    let mut filled = 0;

    while filled < beats_per_bar {
        let rolled = *config.phrase_lengths.roll(rng, "phrase lengths")?;
        if rolled == 0 {
            return Err(ComposeError::InvalidConfig("phrase length of 0 beats".into()));
        }
        let beats = rolled.min(beats_per_bar - filled);
        let pattern = config.patterns.choose(request.index, rng)?;
        let start_degree = match config.phrase_start {
            PhraseStart::BarDegree => request.degree,
            PhraseStart::RolledDegree => {
                request.degree + rng.roll_usize(request.mode.degree_count() + 1) as i32
            }
        };

        let phrase = PhraseDescriptor {
            root: request.root,
            mode: request.mode,
            start_degree,
            beats,
        };
        let events = pattern.generate(&phrase, &config.kit, rng)?;
        filled += beats;

        // Only a phrase that fits again gets a chance to repeat.
        let repeated = config.repeat_one_in > 0
            && beats <= beats_per_bar - filled
            && rng.roll(config.repeat_one_in as u64) == 0;

        bar.events.extend_from_slice(&events);
        if repeated {
            bar.events.extend(events);
            filled += beats;
        }
        debug!(
            bar = request.index,
            pattern = pattern.tag(),
            start_degree,
            beats,
            repeated,
            "phrase"
        );
        bar.phrases.push(PhraseRecord {
            pattern,
            beats,
            repeated,
        });
    }

    validate_events(&bar.events)?;
    Ok(bar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chance::WeightedTable;
    use crate::config::PatternSelection;
    use crate::event::{NoteKind, SIXTEENTH_TICKS, TICKS_PER_BEAT, total_ticks};

    fn request(mode: &Mode, index: usize) -> BarRequest<'_> {
        BarRequest {
            root: 50,
            mode,
            degree: 0,
            index,
        }
    }

    #[test]
    fn test_bar_fills_exact_beat_budget() {
        let mode = Mode::church("Dorian").unwrap();
        for config in [
            CompositionConfig::pressure(),
            CompositionConfig::variants(),
            CompositionConfig::micromodes(),
        ] {
            let mut rng = MusicRng::from_seed_str("budget");
            for index in 0..40 {
                let bar = compose_bar(&request(&mode, index), &config, &mut rng).unwrap();
                assert_eq!(bar.beats(), config.beats_per_bar);
                assert_eq!(
                    total_ticks(&bar.events),
                    (config.beats_per_bar * TICKS_PER_BEAT) as u64
                );
            }
        }
    }

    #[test]
    fn test_long_phrase_is_clipped() {
        let mode = Mode::church("Aeolian").unwrap();
        let mut config = CompositionConfig::variants();
        config.beats_per_bar = 3;
        config.phrase_lengths = WeightedTable::new(vec![(1, 8)]);
        let mut rng = MusicRng::new(4);
        let bar = compose_bar(&request(&mode, 0), &config, &mut rng).unwrap();
        assert_eq!(bar.phrases.len(), 1);
        assert_eq!(bar.phrases[0].beats, 3);
        assert!(!bar.phrases[0].repeated);
    }

    #[test]
    fn test_repeat_duplicates_phrase() {
        let mode = Mode::church("Aeolian").unwrap();
        let mut config = CompositionConfig::variants();
        config.beats_per_bar = 4;
        config.phrase_lengths = WeightedTable::new(vec![(1, 2)]);
        config.patterns = PatternSelection::Sequence(vec![PhrasePattern::RunUp]);
        config.repeat_one_in = 1;
        let mut rng = MusicRng::new(9);
        let bar = compose_bar(&request(&mode, 0), &config, &mut rng).unwrap();

        assert_eq!(bar.phrases.len(), 1);
        assert!(bar.phrases[0].repeated);
        let half = bar.events.len() / 2;
        let notes: Vec<u8> = bar.events.iter().map(|e| e.note).collect();
        assert_eq!(notes[..half], notes[half..]);
        assert_eq!(total_ticks(&bar.events), 16 * SIXTEENTH_TICKS as u64);
    }

    #[test]
    fn test_repeat_disabled() {
        let mode = Mode::church("Aeolian").unwrap();
        let mut config = CompositionConfig::variants();
        config.beats_per_bar = 4;
        config.phrase_lengths = WeightedTable::new(vec![(1, 1)]);
        config.repeat_one_in = 0;
        let mut rng = MusicRng::new(9);
        let bar = compose_bar(&request(&mode, 0), &config, &mut rng).unwrap();
        assert_eq!(bar.phrases.len(), 4);
        assert!(bar.phrases.iter().all(|p| !p.repeated));
    }

    #[test]
    fn test_sequence_follows_bar_index() {
        let mode = Mode::church("Aeolian").unwrap();
        let config = CompositionConfig::pressure();
        let mut rng = MusicRng::new(2);
        let bar = compose_bar(&request(&mode, 11), &config, &mut rng).unwrap();
        assert!(bar.phrases.iter().all(|p| p.pattern == PhrasePattern::ArpeggioUp));
        let first = bar.events.iter().find(|e| e.kind == NoteKind::NoteOn).unwrap();
        assert_eq!(first.creator.as_deref(), Some("arpeggioUp"));
    }

    #[test]
    fn test_rolled_phrase_start_stays_within_an_octave() {
        let mode = Mode::church("Aeolian").unwrap();
        let mut config = CompositionConfig::micromodes();
        config.patterns = PatternSelection::Sequence(vec![PhrasePattern::RunUp]);
        let lowest = mode.pitch_for_degree(50, 0);
        let highest = mode.pitch_for_degree(50, 7);
        let mut starts = Vec::new();
        let mut rng = MusicRng::from_seed_str("starts");
        for index in 0..50 {
            let bar = compose_bar(&request(&mode, index), &config, &mut rng).unwrap();
            // Each one-beat run starts a new phrase every fourth note.
            let ons: Vec<u8> = bar
                .events
                .iter()
                .filter(|e| e.kind == NoteKind::NoteOn)
                .map(|e| e.note)
                .collect();
            for chunk in ons.chunks(4) {
                let start = chunk[0] as i32;
                assert!((lowest..=highest).contains(&start), "start {start}");
                starts.push(start);
            }
        }
        assert!(starts.contains(&lowest) && starts.contains(&highest));
    }

    #[test]
    fn test_bar_is_deterministic() {
        let mode = Mode::church("Locrian").unwrap();
        let config = CompositionConfig::variants();
        let mut a = MusicRng::from_seed_str("same");
        let mut b = MusicRng::from_seed_str("same");
        let x = compose_bar(&request(&mode, 3), &config, &mut a).unwrap();
        let y = compose_bar(&request(&mode, 3), &config, &mut b).unwrap();
        assert_eq!(x.events, y.events);
        assert_eq!(x.phrases, y.phrases);
    }
}
