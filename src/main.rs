// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use iris_camera::session::catalog::LensCategory;
use iris_camera::{Config, ResolutionPreset};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "iris-camera")]
#[command(about = "Camera session core driven by the virtual backend")]
#[command(version = iris_camera::constants::app_info::version())]
struct Cli {
    /// Configuration file (default: ~/.config/iris-camera/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available lenses
    List {
        /// Hide front-facing lenses
        #[arg(long)]
        back_only: bool,
    },

    /// Take a photo
    Photo {
        /// Lens category to use (wide, ultraWide, telephoto, ...)
        #[arg(short, long)]
        lens: Option<LensCategory>,

        /// Resolution preset (low, medium, high, veryHigh, ultraHigh, max)
        #[arg(short, long)]
        preset: Option<ResolutionPreset>,

        /// Flash mode (auto, on, off)
        #[arg(short, long)]
        flash: Option<String>,

        /// Output file path (default: ~/Pictures/IrisCamera/photo_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print streamed analysis frames
    Stream {
        #[arg(short, long)]
        lens: Option<LensCategory>,

        /// Number of frames to print
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Record a video
    Video {
        #[arg(short, long)]
        lens: Option<LensCategory>,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "3")]
        duration: u64,

        /// Output file path (default: ~/Videos/IrisCamera/video_TIMESTAMP.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable audio recording
        #[arg(short, long)]
        audio: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=iris_camera=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::List { back_only } => cli::list_lenses(&config, !back_only).await,
        Commands::Photo {
            lens,
            preset,
            flash,
            output,
        } => cli::take_photo(&config, lens, preset, flash, output).await,
        Commands::Stream { lens, count } => cli::stream_frames(&config, lens, count).await,
        Commands::Video {
            lens,
            duration,
            output,
            audio,
        } => cli::record_video(&config, lens, duration, output, audio).await,
    }
}
