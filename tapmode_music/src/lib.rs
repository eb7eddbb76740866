// Tapmode Music Generator
//
// A seeded, rule-based composer of short modal riff pieces. A piece is a
// sequence of sections, each in its own church mode, each made of bars that
// are filled with short melodic gestures (runs, arpeggios, tapping figures,
// theme variations) on a sixteenth-note grid. Two roles are produced per
// piece, a lead line and a rhythm pulse, and either can be rendered to a
// Standard MIDI File.
//
// Architecture:
// - chance.rs: Weighted tables plus uniform pick and shuffle
// - mode.rs: Mode definitions, the church-mode catalogue, degree-to-pitch mapping
// - event.rs: Note and meta events, note-pair construction, track validation
// - phrase.rs: The phrase gestures behind one generator trait
// - bar.rs: Fills a bar's beat budget with phrases, with optional repeats
// - piece.rs: Section planning (modes, roots, bar degrees), rhythm, cadence
// - config.rs: Data-driven composition config with named presets
// - midi.rs: MIDI file output from composed pieces, delta rescaling
// - error.rs: Error type shared by every stage
//
// All randomness flows from one `tapmode_prng::MusicRng` seeded from the
// request's seed text, so output is reproducible given a seed and config.

pub mod bar;
pub mod chance;
pub mod config;
pub mod error;
pub mod event;
pub mod midi;
pub mod mode;
pub mod phrase;
pub mod piece;
