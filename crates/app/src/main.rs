use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rhythm_core::{AutoPlayer, GameConfig, GameSession, ManualClock, SessionSummary};
use tracing_subscriber::EnvFilter;

const FRAME_MS: f64 = 1000.0 / 60.0;

fn main() -> rhythm_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Autoplay(args) => run_autoplay(args),
        Commands::Config => print_default_config(),
    }
}

fn run_autoplay(args: AutoplayArgs) -> rhythm_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(bpm) = args.bpm {
        config.timing.bpm = bpm;
    }
    if let Some(beats) = args.beats_per_loop {
        config.timing.beats_per_loop = beats;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let duration_ms = args.seconds * 1000.0;
    if !duration_ms.is_finite() || duration_ms <= 0.0 {
        return Err(rhythm_core::RhythmError::msg(format!(
            "--seconds must be positive, got {}",
            args.seconds
        )));
    }

    let clock = ManualClock::new(duration_ms);
    let mut session = GameSession::new(config)?.with_clock(clock.clone());
    let mut player = AutoPlayer::new(args.offset_ms);

    tracing::info!(
        seconds = args.seconds,
        offset_ms = args.offset_ms,
        seed = session.seed(),
        "running headless autoplay"
    );

    session.start();
    while session.is_playing() {
        clock.advance(FRAME_MS);
        session.tick(FRAME_MS);
        player.update(&mut session);
    }

    let summary = session.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_default_config() -> rhythm_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(&GameConfig::default())?);
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("score       {}", summary.total_score);
    println!("grade       {} ({:.1}%)", summary.grade, summary.accuracy);
    println!("max combo   {}", summary.max_combo);
    println!(
        "notes       {} perfect / {} good / {} miss",
        summary.counts.perfect, summary.counts.good, summary.counts.miss
    );
    println!(
        "patterns    {} completed / {} failed / {} finish moves",
        summary.patterns_completed, summary.patterns_failed, summary.finish_moves
    );
    println!("level       {} after {} loops", summary.level, summary.loops);
    println!("experience  {}", summary.experience);
    println!("seed        {}", summary.seed);
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless driver for the rhythm game core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a session automatically against a simulated 60 Hz clock.
    Autoplay(AutoplayArgs),
    /// Print the default configuration as JSON.
    Config,
}

#[derive(clap::Args, Debug)]
struct AutoplayArgs {
    /// Tempo override, clamped to 60-200.
    #[arg(long)]
    bpm: Option<f64>,
    /// Beats per loop override, clamped to 1-8.
    #[arg(long)]
    beats_per_loop: Option<u32>,
    /// Song length in seconds.
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,
    /// Seed for pattern generation.
    #[arg(long)]
    seed: Option<u64>,
    /// How far after the beat the automated sync input lands.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_ms: f64,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}
