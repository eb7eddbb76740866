// Tapmode: CLI entry point.
//
// Composes a seeded modal piece and writes one of its roles (rhythm or lead)
// to a Standard MIDI File. The pipeline: load config → compose sections and
// bars → render the requested track → write MIDI.
//
// Usage:
//   cargo run -p tapmode_music -- --sections N --role rhythm|lead --output out.mid
//     [--bars-per-section N] [--seed TEXT] [--preset pressure|variants|micromodes]
//     [--config FILE.json] [--dump-json]
//
// Without --seed a random five-character seed is drawn and logged, so any
// run can be reproduced. Set RUST_LOG=debug to see every phrase choice.

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::path::PathBuf;
use tapmode_music::config::CompositionConfig;
use tapmode_music::midi::write_midi;
use tapmode_music::piece::{PieceRequest, Role, compose_piece};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tapmode")]
#[command(about = "Seeded modal riff composer with MIDI output", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of sections in the piece
    #[arg(long)]
    sections: u32,

    /// Bars in each section
    #[arg(long, alias = "barsPerSection", default_value_t = PieceRequest::DEFAULT_BARS_PER_SECTION)]
    bars_per_section: u32,

    /// Output MIDI file
    #[arg(short, long)]
    output: PathBuf,

    /// Which track to write: rhythm or lead
    #[arg(long)]
    role: Role,

    /// Seed text; random when omitted
    #[arg(long)]
    seed: Option<String>,

    /// Built-in composition preset: pressure, variants or micromodes
    #[arg(long, default_value = "pressure")]
    preset: String,

    /// JSON composition config (overrides --preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the composed piece as JSON to stdout
    #[arg(long)]
    dump_json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let seed = cli.seed.unwrap_or_else(random_seed);
    let request = PieceRequest::new(seed, cli.sections).bars_per_section(cli.bars_per_section);
    request.validate().context("invalid request")?;
    info!("Seed: {}", request.seed);

    let config = match &cli.config {
        Some(path) => CompositionConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CompositionConfig::preset(&cli.preset)?,
    };

    let piece = compose_piece(&request, &config).context("composition failed")?;
    for (i, section) in piece.sections.iter().enumerate() {
        info!(
            "Section {}: {} on {}, bar degrees {:?}",
            i,
            section.mode.name(),
            section.root,
            section.bars.iter().map(|b| b.degree).collect::<Vec<_>>()
        );
    }

    if cli.dump_json {
        println!("{}", serde_json::to_string_pretty(&piece)?);
    }

    write_midi(&piece, cli.role, &cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(
        "Wrote {} track ({} events) to {}",
        cli.role,
        piece.track(cli.role).len(),
        cli.output.display()
    );
    Ok(())
}

fn random_seed() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect()
}
