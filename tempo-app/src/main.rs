//! tempo - estimate the tempo of an audio file
//!
//! Prints the fused BPM estimate and optionally plots the onset envelope,
//! its spectrum and its autocorrelation in the terminal.

mod plot;
mod theme;

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tempo_analysis::TempoDetector;
use tempo_library::{Config, FileSource};

#[derive(Parser, Debug)]
#[command(name = "tempo", version, about = "Estimate the tempo of an audio file in BPM")]
struct Cli {
    /// Audio file to analyse (mp3, flac, ogg, wav, m4a)
    file: PathBuf,

    /// Show the onset envelope, spectrum and autocorrelation after estimating
    #[arg(long)]
    plot: bool,

    /// Config file to read instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,

    /// Analysis sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Samples between onset envelope frames
    #[arg(long)]
    hop_length: Option<usize>,

    /// Slowest tempo considered
    #[arg(long)]
    min_bpm: Option<f32>,

    /// Fastest tempo considered
    #[arg(long)]
    max_bpm: Option<f32>,

    /// Largest disagreement in BPM at which the two estimates are averaged
    #[arg(long)]
    threshold: Option<f32>,

    /// Seconds of envelope covered by the autocorrelation
    #[arg(long)]
    autocorrelation_secs: Option<f32>,
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            sample_rate: self.sample_rate,
            hop_length: self.hop_length,
            min_bpm: self.min_bpm,
            max_bpm: self.max_bpm,
            agreement_threshold: self.threshold,
            autocorrelation_secs: self.autocorrelation_secs,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::load(),
    };
    let config = cli
        .overrides()
        .or(file_config)
        .to_detector_config()
        .context("Invalid detector settings")?;

    if cli.save_config {
        let settings = Config::from_detector(&config);
        let path = match &cli.config {
            Some(path) => settings.save_to(path).map(|_| path.clone()),
            None => settings.save(),
        }
        .context("Failed to save config")?;
        tracing::info!("Saved settings to {}", path.display());
    }

    let mut detector = TempoDetector::new(FileSource::new(&cli.file), config)?;
    let bpm = detector
        .detect_tempo()
        .with_context(|| {
            format!(
                "Failed to estimate tempo of {}",
                detector.source().path().display()
            )
        })?;

    if let Some(metadata) = detector.source().metadata() {
        tracing::info!(
            "{} - {} ({:.1}s)",
            metadata.artist,
            metadata.title,
            metadata.duration_secs
        );
    }

    println!("Estimated tempo: {:.2} BPM", bpm);

    if cli.plot {
        let diagnostics = detector.diagnostics()?;
        plot::show(&diagnostics, bpm, detector.config())?;
    }

    Ok(())
}
