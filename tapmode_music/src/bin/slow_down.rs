// Tapmode slow-down: rescales the timing of an existing MIDI file.
//
// Every event delta is multiplied by the time change factor, so 2 plays
// the file twice as slow and 0.5 twice as fast. Tempo events are left as
// they are.
//
// Usage:
//   cargo run -p tapmode_music --bin tapmode-slowdown -- <FACTOR> <INPUT> <OUTPUT>

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tapmode_music::midi::rescale_timing;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tapmode-slowdown")]
#[command(about = "Multiply every delta time in a MIDI file by a factor", long_about = None)]
#[command(version)]
struct Cli {
    /// Time change factor: 2 is twice as slow, 0.5 twice as fast
    factor: f64,

    /// MIDI file to read
    input: PathBuf,

    /// Where to write the rescaled file
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let input = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let output = rescale_timing(&input, cli.factor)
        .with_context(|| format!("failed to rescale {}", cli.input.display()))?;
    std::fs::write(&cli.output, &output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(
        "Rescaled {} by {} into {} ({} bytes)",
        cli.input.display(),
        cli.factor,
        cli.output.display(),
        output.len()
    );
    Ok(())
}
