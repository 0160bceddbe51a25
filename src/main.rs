//! livedoc - keeps live viewers in step with one shared JSON document.

mod cli;
mod config;
mod core;
mod document;
mod hub;
mod logger;
mod predict;
mod watch;
mod ws;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::LivedocConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = LivedocConfig::load(&cli)?;

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(&config),
        Commands::Show { compact, .. } => cli::show::show(&config, *compact),
        Commands::Init { .. } => cli::init::init(&config),
    }
}
