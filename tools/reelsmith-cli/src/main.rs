//! Reelsmith CLI: create and extend FCPXML projects from media files.
//!
//! Usage:
//!   reelsmith new <OUTPUT>              Write an empty project
//!   reelsmith append <PROJECT> [OPTS]   Append one clip to a project
//!   reelsmith build <MANIFEST> -o OUT   Append every clip listed in a JSON manifest
//!   reelsmith info <PATH>               Show project information
//!   reelsmith validate <PATH>           Check a project for structural problems
//!   reelsmith check                     Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelsmith_common::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "reelsmith",
    about = "Build Final Cut Pro XML timelines from media files",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new empty project
    New {
        /// Output .fcpxml path
        output: PathBuf,

        /// Project name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Append one clip to a project, creating it if needed
    Append {
        /// Project .fcpxml path
        project: PathBuf,

        /// Video or image file
        #[arg(long)]
        video: PathBuf,

        /// Separate audio file, nested under the visual on its own lane
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Title text shown over the clip
        #[arg(long)]
        text: Option<String>,

        /// Clip duration in seconds (default: from media)
        #[arg(long)]
        duration: Option<f64>,

        /// Slide the clip in over its first two seconds
        #[arg(long)]
        slide: bool,

        /// Wrap video and audio in a compound clip
        #[arg(long)]
        compound: bool,

        /// Write here instead of overwriting the project
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append every clip listed in a JSON manifest
    Build {
        /// Manifest path (JSON array of clips)
        manifest: PathBuf,

        /// Output .fcpxml path
        #[arg(short, long)]
        output: PathBuf,

        /// Existing project to extend instead of starting empty
        #[arg(long)]
        project: Option<PathBuf>,

        /// Wrap video and audio in compound clips
        #[arg(long)]
        compound: bool,
    },

    /// Show project information
    Info {
        /// Project .fcpxml path
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a project for structural problems
    Validate {
        /// Project .fcpxml path
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelsmith_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::New { output, name } => commands::new::run(output, name, &config),
        Commands::Append {
            project,
            video,
            audio,
            text,
            duration,
            slide,
            compound,
            output,
        } => {
            config.timeline.compound_audio |= compound;
            let clip = commands::append::ClipArgs {
                video,
                audio,
                text,
                duration,
                slide,
            };
            commands::append::run(project, clip, output, &config)
        }
        Commands::Build {
            manifest,
            output,
            project,
            compound,
        } => {
            config.timeline.compound_audio |= compound;
            commands::build::run(manifest, output, project, &config).await
        }
        Commands::Info { path, json } => commands::info::run(path, json),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Check => commands::check::run(&config),
    }
}
