//! vidredact CLI: blur annotated regions in videos.
//!
//! Usage:
//!   vidredact run <IN> <OUT> <ANNOTATION> [<IN> <OUT> <ANNOTATION>...]
//!   vidredact inspect <ANNOTATION>    Summarize an annotation file
//!   vidredact check                   Check for ffmpeg/ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vidredact_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vidredact",
    about = "Blur annotated regions across a batch of videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact one or more (input, output, annotation) triplets
    Run {
        /// Paths consumed three at a time: input video, output video, annotation file
        #[arg(required = true, value_name = "IN OUT ANNOTATION")]
        triplets: Vec<PathBuf>,

        /// Output video encoder (ffmpeg -c:v)
        #[arg(long)]
        codec: Option<String>,

        /// Kernel size as a fraction of the region's larger side
        #[arg(long)]
        kernel_ratio: Option<f64>,

        /// Also skip regions marked outside the frame
        #[arg(long)]
        skip_outside: bool,

        /// Write a JSON batch report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Summarize an annotation file
    Inspect {
        /// Path to the annotation XML
        path: PathBuf,
    },

    /// Check that the media tools are available
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    vidredact_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Run {
            triplets,
            codec,
            kernel_ratio,
            skip_outside,
            report,
        } => {
            if let Some(codec) = codec {
                config.media.video_codec = codec;
            }
            if let Some(ratio) = kernel_ratio {
                config.blur.kernel_ratio = ratio;
            }
            if skip_outside {
                config.blur.skip_outside = true;
            }
            commands::run::run(config, triplets, report)
        }
        Commands::Inspect { path } => commands::inspect::run(path),
        Commands::Check => commands::check::run(&config),
    }
}
