// Error types for phrase generation and piece composition.
//
// Three families: configuration errors (malformed modes, empty tables,
// impossible policies) abort the run before or during generation; numeric
// validation errors (a pitch or event outside MIDI range) abort the bar that
// produced them and carry enough context to find the generator; input errors
// are the precondition failures the CLI layer reports before generating.
// Rewriting an existing MIDI file adds unreadable input and write failures.
//
// None of these are retried. The only loop that redraws is the section mode
// reroll in piece.rs, and that is a sampling policy, not error recovery.

use thiserror::Error;

/// Errors that can occur while configuring or composing a piece.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot roll table '{table}': total weight is zero")]
    EmptyTable { table: String },
    #[error("malformed mode '{name}': {reason}")]
    MalformedMode { name: String, reason: String },
    #[error("unknown mode '{name}'")]
    UnknownMode { name: String },
    #[error("pitch {pitch} out of range: root {root}, degree {degree}, offset {offset}, {mode}")]
    PitchOutOfRange {
        pitch: i32,
        root: i32,
        degree: i32,
        offset: usize,
        mode: String,
    },
    #[error("invalid note from '{creator}': {reason}")]
    InvalidNote { creator: String, reason: String },
    #[error("invalid event at index {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ConfigJson(#[from] serde_json::Error),
    #[error("not a readable MIDI file: {0}")]
    InvalidMidi(String),
    #[error("failed to write MIDI: {0}")]
    MidiIo(std::io::Error),
}

impl ComposeError {
    /// Stable identifier for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            ComposeError::EmptyTable { .. } => "COMPOSE_001",
            ComposeError::MalformedMode { .. } => "COMPOSE_002",
            ComposeError::UnknownMode { .. } => "COMPOSE_003",
            ComposeError::PitchOutOfRange { .. } => "COMPOSE_004",
            ComposeError::InvalidNote { .. } => "COMPOSE_005",
            ComposeError::InvalidEvent { .. } => "COMPOSE_006",
            ComposeError::InvalidConfig(_) => "COMPOSE_007",
            ComposeError::InvalidInput(_) => "COMPOSE_008",
            ComposeError::ConfigIo(_) => "COMPOSE_009",
            ComposeError::ConfigJson(_) => "COMPOSE_010",
            ComposeError::InvalidMidi(_) => "COMPOSE_011",
            ComposeError::MidiIo(_) => "COMPOSE_012",
        }
    }

    /// Which family of failure this is.
    pub fn category(&self) -> &'static str {
        match self {
            ComposeError::PitchOutOfRange { .. }
            | ComposeError::InvalidNote { .. }
            | ComposeError::InvalidEvent { .. } => "numeric",
            ComposeError::InvalidInput(_) | ComposeError::InvalidMidi(_) => "input",
            ComposeError::MidiIo(_) => "io",
            _ => "config",
        }
    }
}
