//! Framegrab CLI: inspect capture targets and run capture sessions.
//!
//! Usage:
//!   framegrab targets           List capturable monitors and windows
//!   framegrab check             Check capture capabilities
//!   framegrab capture [OPTIONS] Capture a target and report frame statistics
//!   framegrab config [--save]   Show (or write) the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "framegrab",
    about = "Fixed-rate screen, window, and region capture",
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
    /// List capturable monitors and windows
    Targets {
        /// Use the in-memory synthetic desktop
        #[arg(long)]
        synthetic: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check capture capabilities of this system
    Check,

    /// Capture a target and report frame statistics
    Capture(commands::capture::CaptureArgs),

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut app_config = framegrab_common::config::AppConfig::load();
    if cli.verbose {
        app_config.logging.level = "debug".to_string();
    }
    framegrab_common::logging::init_logging(&app_config.logging);

    match cli.command {
        Commands::Targets { synthetic, json } => commands::targets::run(synthetic, json),
        Commands::Check => commands::check::run(),
        Commands::Capture(args) => commands::capture::run(args, &app_config).await,
        Commands::Config { save } => commands::config::run(&app_config, save),
    }
}
