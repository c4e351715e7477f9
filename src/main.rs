//! Titan dev orchestrator - bundles actions, regenerates routes, supervises the server.

mod bundle;
mod cli;
mod config;
mod diagnostics;
mod logger;
mod orchestrate;
mod routes;
mod shutdown;
mod supervisor;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::TitanConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    shutdown::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    logger::set_verbose(cli.verbose);

    let config = TitanConfig::load(cli)?;

    match &cli.command {
        Commands::Build { .. } => cli::build::run_build(&config),
        Commands::Dev { .. } => cli::dev::run_dev(config),
    }
}
