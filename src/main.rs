use anyhow::{Context, Result};
use clap::Parser;
use music_extractor::analysis::{AnalysisOutcome, CancelToken};
use music_extractor::config::{Backend, Config};
use music_extractor::segments::format_seconds;
use music_extractor::{extract_music, print_segments, print_summary, ExtractOptions, Toolset};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "music-extractor")]
#[command(version, about = "Find and extract the music in long radio recordings")]
#[command(
    long_about = "Listens to a recording window by window, notes where people speak and cuts out the music in between. Analysis is saved next to the input and picks up where it stopped."
)]
struct Cli {
    /// Input audio file
    input: PathBuf,

    /// Only analyse and list the music segments, export nothing
    #[arg(short, long)]
    analyse: bool,

    /// Stretch each segment across the following announcement
    #[arg(short, long)]
    merge: bool,

    /// Segments to keep, e.g. 1,2-3,6 (default: all)
    #[arg(short, long)]
    keep: Option<String>,

    /// Base name for exported files (default: input file name)
    #[arg(short, long)]
    name: Option<String>,

    /// Speech recognition backend: whisper, gemini
    #[arg(short, long)]
    backend: Option<String>,

    /// Skip the recognizer for windows the local voice detector finds quiet
    #[arg(long)]
    vad_gate: bool,

    /// Spoken language code (e.g., de, en)
    #[arg(short, long)]
    language: Option<String>,

    /// Window length in seconds for a new analysis
    #[arg(long)]
    segment_length: Option<u32>,

    /// Do not trim speech off the exported clips
    #[arg(long)]
    no_trim: bool,

    /// Seconds inspected at head and tail when trimming
    #[arg(long)]
    inspection_window: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(ref backend) = cli.backend {
        config.backend = backend
            .parse::<Backend>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if let Some(ref language) = cli.language {
        config.language = language.clone();
    }
    if let Some(length) = cli.segment_length {
        config.segment_length = length;
    }
    if let Some(window) = cli.inspection_window {
        config.trim.inspection_window = window;
    }
    if cli.vad_gate {
        config.vad_gate = true;
    }
    Ok(())
}

fn build_options(config: &Config, cli: &Cli) -> ExtractOptions {
    ExtractOptions {
        segment_length: config.segment_length,
        merge: cli.merge,
        selection: cli.keep.clone(),
        name: cli.name.clone(),
        analyse_only: cli.analyse,
        trim: (!cli.no_trim).then(|| config.trim.clone()),
        show_progress: !cli.verbose,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli)?;
    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Input:    {}", cli.input.display());
    info!("Backend:  {}", config.backend);
    info!("Language: {}", config.language);

    let tools = Toolset::from_config(&config).context("Failed to set up audio and speech tools")?;

    let cancel = CancelToken::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping after the current window...");
        handle.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let options = build_options(&config, &cli);
    let result = extract_music(&cli.input, &tools, &options, cancel)
        .await
        .with_context(|| format!("Failed to extract music from {}", cli.input.display()))?;

    match result.outcome() {
        AnalysisOutcome::Interrupted { resume_at } => {
            info!(
                "Analysis saved. Run the same command again to continue at {}.",
                format_seconds(resume_at as f64)
            );
            Ok(())
        }
        AnalysisOutcome::Incomplete { resume_at } => {
            anyhow::bail!(
                "Speech recognition unavailable at {}. Run again later to continue.",
                format_seconds(resume_at as f64)
            )
        }
        AnalysisOutcome::Completed | AnalysisOutcome::AlreadyComplete => {
            print_segments(&result.segments);
            if !cli.analyse {
                print_summary(&result);
            }
            Ok(())
        }
    }
}
