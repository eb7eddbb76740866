// Whole-piece properties checked across many seeds and both presets.

use pretty_assertions::assert_eq;
use tapmode_music::chance::WeightedTable;
use tapmode_music::config::{CompositionConfig, HomeMode};
use tapmode_music::event::{
    NoteKind, SIXTEENTH_TICKS, TICKS_PER_BEAT, total_ticks, validate_events,
};
use tapmode_music::midi::{midi_bytes, rescale_timing};
use tapmode_music::mode::Mode;
use tapmode_music::phrase::{PhraseDescriptor, PhraseGenerator, PhraseKit, PhrasePattern};
use tapmode_music::piece::{PieceRequest, Role, compose_piece};
use tapmode_prng::MusicRng;

const SEEDS: [&str; 8] = [
    "abc12", "k9Qz1", "00000", "zzzzz", "tap", "riff", "mode7", "Xy3vB",
];

fn presets() -> [CompositionConfig; 3] {
    [
        CompositionConfig::pressure(),
        CompositionConfig::variants(),
        CompositionConfig::micromodes(),
    ]
}

#[test]
fn same_seed_same_piece() {
    for config in presets() {
        let request = PieceRequest::new("abc12", 3);
        let a = compose_piece(&request, &config).unwrap();
        let b = compose_piece(&request, &config).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn different_seeds_differ() {
    let config = CompositionConfig::variants();
    let a = compose_piece(&PieceRequest::new("abc12", 2), &config).unwrap();
    let b = compose_piece(&PieceRequest::new("abc13", 2), &config).unwrap();
    assert_ne!(a.lead, b.lead);
}

#[test]
fn tracks_are_well_formed() {
    for config in presets() {
        for seed in SEEDS {
            let piece = compose_piece(&PieceRequest::new(seed, 4), &config).unwrap();
            for role in [Role::Lead, Role::Rhythm] {
                let track = piece.track(role);
                validate_events(track).unwrap();
                for pair in track.chunks(2) {
                    assert_eq!(pair[0].kind, NoteKind::NoteOn);
                    assert_eq!(pair[0].delta_ticks, 0);
                    assert_eq!(pair[1].kind, NoteKind::NoteOff);
                    assert_eq!(pair[1].note, pair[0].note);
                    assert!(pair[1].delta_ticks > 0);
                    assert!(pair[0].note <= 127);
                    assert!(pair[0].velocity <= 127);
                }
            }
        }
    }
}

#[test]
fn every_bar_fills_its_beats() {
    for config in presets() {
        for seed in SEEDS {
            let request = PieceRequest::new(seed, 2).bars_per_section(3);
            let piece = compose_piece(&request, &config).unwrap();
            for section in &piece.sections {
                for bar in &section.bars {
                    let beats: u32 = bar
                        .phrases
                        .iter()
                        .map(|p| if p.repeated { 2 * p.beats } else { p.beats })
                        .sum();
                    assert_eq!(beats, config.beats_per_bar);
                }
            }
            let bars = 2 * 3;
            let cadence = config
                .cadence
                .map_or(0, |c| (c.sixteenths * SIXTEENTH_TICKS) as u64);
            assert_eq!(
                total_ticks(&piece.lead),
                (bars * config.beats_per_bar * TICKS_PER_BEAT) as u64 + cadence
            );
        }
    }
}

#[test]
fn adjacent_sections_change_mode() {
    for config in [CompositionConfig::pressure(), CompositionConfig::variants()] {
        for seed in SEEDS {
            let piece = compose_piece(&PieceRequest::new(seed, 5), &config).unwrap();
            let modes = piece.section_modes();
            // The final section returns home and may match its predecessor.
            for pair in modes[..modes.len() - 1].windows(2) {
                assert_ne!(pair[0], pair[1], "seed {seed}: {modes:?}");
            }
        }
    }
}

// The first roll of the "abc12" stream is 0.8292452119188486; times 11 that
// lands on 9, inside Locrian's share of the table (Aeolian 0..7, Phrygian 7..9,
// Locrian 9..11).
#[test]
fn abc12_two_sections_end_home_with_cadence() {
    let mut config = CompositionConfig::pressure();
    config.section_modes = WeightedTable::new(vec![
        (7, Mode::church("Aeolian").unwrap()),
        (2, Mode::church("Phrygian").unwrap()),
        (2, Mode::church("Locrian").unwrap()),
    ]);
    config.home_mode = HomeMode::Named("Aeolian".into());

    let request = PieceRequest::new("abc12", 2).bars_per_section(4);
    let piece = compose_piece(&request, &config).unwrap();
    assert_eq!(piece.sections.len(), 2);
    assert!(piece.sections.iter().all(|s| s.bars.len() == 4));
    assert_eq!(piece.section_modes(), vec!["Locrian", "Aeolian"]);

    let last = piece.lead.last().unwrap();
    assert_eq!(last.kind, NoteKind::NoteOff);
    assert_eq!(last.delta_ticks, 3840);
    let cadence = config.cadence.unwrap();
    let expected = cadence.pitch(piece.sections[1].root);
    assert_eq!(last.note as i32, expected);
    assert_eq!(piece.cadence_pitch.map(i32::from), Some(expected));
}

#[test]
fn tapping_always_reaches_the_root() {
    let mode = Mode::church("Dorian").unwrap();
    let kit = PhraseKit::default();
    let mut rng = MusicRng::from_seed_str("tapping");
    for beats in 1..=4 {
        for _ in 0..200 {
            let phrase = PhraseDescriptor {
                root: 50,
                mode: &mode,
                start_degree: 2,
                beats,
            };
            let events = PhrasePattern::Tapping
                .generate(&phrase, &kit, &mut rng)
                .unwrap();
            let root_pitch = mode.pitch_for_degree(50, 2);
            assert!(
                events
                    .iter()
                    .any(|e| e.kind == NoteKind::NoteOn && e.note as i32 == root_pitch),
                "{beats}-beat tapping phrase never sounded its root"
            );
        }
    }
}

#[test]
fn meta_track_matches_config() {
    let piece =
        compose_piece(&PieceRequest::new("meta", 1), &CompositionConfig::variants()).unwrap();
    let json = serde_json::to_value(&piece.meta).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {
                "type": "timeSignature",
                "numerator": 5,
                "denominator": 4,
                "metronome": 1,
                "thirtySeconds": 8
            },
            {"type": "setTempo", "microsPerBeat": 1000000},
            {"type": "endOfTrack"}
        ])
    );
}

#[test]
fn config_from_json_composes() {
    let json = serde_json::to_string(&CompositionConfig::variants()).unwrap();
    let config = CompositionConfig::from_json(&json).unwrap();
    let from_json = compose_piece(&PieceRequest::new("abc12", 2), &config).unwrap();
    let direct =
        compose_piece(&PieceRequest::new("abc12", 2), &CompositionConfig::variants()).unwrap();
    assert_eq!(from_json, direct);
}

#[test]
fn micromodes_composes_and_slows_down() {
    let config = CompositionConfig::micromodes();
    let piece = compose_piece(&PieceRequest::new("abc12", 3), &config).unwrap();
    assert_eq!(piece.cadence_pitch, None);
    let bytes = midi_bytes(&piece, Role::Lead).unwrap();
    let slowed = rescale_timing(&bytes, 2.0).unwrap();
    let parsed = midly::Smf::parse(&slowed).unwrap();
    let ticks: u64 = parsed.tracks[1]
        .iter()
        .map(|e| u64::from(e.delta.as_int()))
        .sum();
    assert_eq!(ticks, 2 * total_ticks(&piece.lead));
}
