// src/main.rs
//! Vizplay - terminal audio player with a live spectrum.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vizplay::app::{App, LogNowPlaying};
use vizplay::audio::{AudioSource, Engine, FileAudioSource};
use vizplay::config::EngineConfig;

/// Command-line arguments for vizplay
#[derive(Parser, Debug)]
#[command(name = "vizplay")]
#[command(about = "Play audio files with a real-time spectrum visualizer")]
#[command(version)]
struct Args {
    /// TOML file overriding analysis and playback settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Index of the track to start with
    #[arg(short, long, default_value_t = 0)]
    start: usize,

    /// Write logs to this file (the terminal is taken by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Audio files to play, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vizplay=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let sources: Vec<Arc<dyn AudioSource>> = args
        .files
        .iter()
        .map(|p| Arc::new(FileAudioSource::from_path(p)) as Arc<dyn AudioSource>)
        .collect();
    if args.start >= sources.len() {
        bail!("--start {} is past the end of {} files", args.start, sources.len());
    }
    info!(tracks = sources.len(), start = args.start, "starting vizplay");

    let engine = Engine::new(config.clone()).context("failed to initialize playback engine")?;
    let mut app = App::new(engine, &config.playback, Box::new(LogNowPlaying));
    app.set_playlist(sources, args.start);
    if let Err(e) = app.play_current() {
        app.status_line = Some(e.to_string());
    }

    vizplay::ui::run(app)
}
