//! Reelsmith CLI: create, inspect, preview, and render slideshow projects.
//!
//! Usage:
//!   reelsmith init <DIR>             Create a new project
//!   reelsmith info <DIR>             Show project information
//!   reelsmith captions <FILE>        Parse and list caption cues
//!   reelsmith snapshot <DIR>         Render a single frame
//!   reelsmith preview <DIR>          Play a project headlessly, dumping frames
//!   reelsmith render <DIR>           Export a project to video
//!   reelsmith check                  Check ffmpeg and its codecs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use reelsmith_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "reelsmith",
    about = "Audio-synced photo slideshows with captions and film effects",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    Init {
        /// Project directory
        path: PathBuf,

        /// Project name (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show project information
    Info {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Parse a caption file and list its cues
    Captions {
        /// Caption file
        file: PathBuf,

        /// Show the cue active at this time and its typewriter reveal
        #[arg(long)]
        at: Option<f64>,
    },

    /// Render a single frame to a PNG
    Snapshot {
        /// Path to the project directory
        path: PathBuf,

        /// Timeline position (seconds)
        #[arg(long, default_value = "0.0")]
        at: f64,

        /// Output image path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        /// Render with the export profile (no cosmetic filters)
        #[arg(long)]
        export_look: bool,
    },

    /// Play a project in real time without a display, saving frames
    Preview {
        /// Path to the project directory
        path: PathBuf,

        /// How long to play (seconds)
        #[arg(long, default_value = "5.0")]
        seconds: f64,

        /// Save every Nth drawn frame
        #[arg(long, default_value = "15")]
        every: u32,

        /// Directory for saved frames
        #[arg(long, default_value = "preview-frames")]
        out_dir: PathBuf,
    },

    /// Export a project to video
    Render {
        /// Path to the project directory
        path: PathBuf,

        /// Output file name without extension (defaults to the project name)
        #[arg(long)]
        filename: Option<String>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Quality preset: ultra|high|medium|low
        #[arg(long)]
        quality: Option<String>,

        /// Container: mp4|webm
        #[arg(long)]
        format: Option<String>,

        /// Output directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Check ffmpeg availability and supported codecs
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    reelsmith_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init { path, name } => commands::init::run(path, name),
        Commands::Info { path } => commands::info::run(&config, path),
        Commands::Captions { file, at } => commands::captions::run(file, at),
        Commands::Snapshot {
            path,
            at,
            output,
            export_look,
        } => commands::snapshot::run(&config, path, at, output, export_look).await,
        Commands::Preview {
            path,
            seconds,
            every,
            out_dir,
        } => commands::preview::run(&config, path, seconds, every, out_dir).await,
        Commands::Render {
            path,
            filename,
            fps,
            quality,
            format,
            out_dir,
        } => {
            commands::render::run(
                &config,
                commands::render::RenderArgs {
                    path,
                    filename,
                    fps,
                    quality,
                    format,
                    out_dir,
                },
            )
            .await
        }
        Commands::Check => commands::check::run(&config).await,
    }
}
