// Chordsmith render: JSON song description in, Standard MIDI File out.
//
// Usage:
//   render <song.json> [-o out.mid] [--seed N] [--ticks-per-beat N]
//     [--tables theory.json] [--verbose]
//
// The seed comes from `--seed`, then the song's `seed` field, then the
// clock; the one used is logged so any render can be repeated. `RUST_LOG`
// overrides the default log level.

use anyhow::Context as _;
use chordsmith_arrange::SongConfig;
use chordsmith_arrange::dice::entropy_seed;
use chordsmith_core::config::DEFAULT_TICKS_PER_BEAT;
use chordsmith_core::{RenderConfig, SmfEncoder, Theory, TheoryTables};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Render a JSON song description to a Standard MIDI File")]
struct Args {
    /// Song description (JSON).
    song: PathBuf,

    /// Output path; defaults to the song path with a .mid extension.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Seed for the generators (overrides the song's seed).
    #[clap(long)]
    seed: Option<u64>,

    /// MIDI time division.
    #[clap(long, default_value_t = DEFAULT_TICKS_PER_BEAT)]
    ticks_per_beat: u16,

    /// Custom theory tables (scales, diatonic qualities, voicings) as JSON.
    #[clap(long)]
    tables: Option<PathBuf>,

    /// Log pipeline detail.
    #[clap(short, long)]
    verbose: bool,
}

fn load_theory(path: Option<&PathBuf>) -> anyhow::Result<Theory> {
    let Some(path) = path else {
        return Ok(Theory::standard());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading theory tables {}", path.display()))?;
    Ok(Theory::new(TheoryTables::from_json(&json)?)?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let song = SongConfig::load(&args.song)
        .with_context(|| format!("loading song {}", args.song.display()))?;
    let theory = load_theory(args.tables.as_ref())?;
    let seed = args.seed.or(song.seed).unwrap_or_else(entropy_seed);
    tracing::info!(title = %song.title, seed, tracks = song.tracks.len(), "rendering");

    let composition = song.build(&theory, seed)?;
    let encoder = SmfEncoder::new(RenderConfig::new(args.ticks_per_beat)?)?;
    let output = args
        .output
        .unwrap_or_else(|| args.song.with_extension("mid"));
    let written = encoder.export(&composition, &output)?;

    tracing::info!(
        path = %written.display(),
        tracks = composition.tracks().len(),
        beats = composition.total_beats(),
        "done"
    );
    Ok(())
}
