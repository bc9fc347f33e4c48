// SPDX-License-Identifier: MIT OR Apache-2.0
//! Funscript editor command-line front-end.
//!
//! Inspects, imports, exports and samples funscripts and `.ofsp` projects
//! without a UI. Diagnostics go to stderr through `tracing`; command output
//! goes to stdout.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use funscript_editor_timeline::{InterpolationMode, TimelineConfig, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVES: &str =
    "funscript_editor_app=info,funscript_editor_project=info,funscript_editor_timeline=warn";

#[derive(Parser)]
#[command(name = "funscript_editor")]
#[command(about = "Inspect and convert funscript motion scripts")]
#[command(version)]
struct Cli {
    /// Editor config file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a funscript or project file
    Info {
        /// `.funscript` or `.ofsp` file
        file: PathBuf,
    },

    /// Create a project from a funscript or a media file
    Import {
        /// Script or media file to import
        script: PathBuf,

        /// Media file; looked up next to the script when omitted
        #[arg(long)]
        media: Option<PathBuf>,

        /// Project file to write; defaults to the imported path with `.ofsp`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write every script of a project as funscript files
    Export {
        /// Project file
        project: PathBuf,

        /// Output directory
        dir: PathBuf,

        /// Also write an `at,pos` CSV next to each script
        #[arg(long)]
        csv: bool,
    },

    /// Print interpolated positions of a funscript
    Sample {
        /// Script to sample
        file: PathBuf,

        /// Distance between samples in milliseconds
        #[arg(long, default_value = "100")]
        step_ms: f64,

        /// Interpolation; defaults to the configured mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },

    /// Write a default config file
    InitConfig {
        /// Destination
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Linear,
    Spline,
}

impl From<Mode> for InterpolationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Linear => Self::Linear,
            Mode::Spline => Self::Spline,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TimelineConfig> {
    if let Some(path) = path {
        return TimelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let local = Path::new(CONFIG_FILE_NAME);
    if local.is_file() {
        tracing::debug!("using {CONFIG_FILE_NAME} from the working directory");
        return TimelineConfig::load(local).context("Failed to load config");
    }
    Ok(TimelineConfig::default())
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::InitConfig { path, force } = &cli.command {
        return commands::init_config(path, *force);
    }

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Info { file } => commands::info(&config, &file),
        Commands::Import { script, media, output } => {
            commands::import(config, &script, media, output.as_deref())
        }
        Commands::Export { project, dir, csv } => commands::export(config, &project, &dir, csv),
        Commands::Sample { file, step_ms, mode } => {
            let mode = mode.map_or(config.interpolation, InterpolationMode::from);
            commands::sample(&config, &file, step_ms, mode)
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!("Starting funscript_editor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
