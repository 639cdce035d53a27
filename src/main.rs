//! Reflow - incremental recompilation cache and hot-reload coordinator for
//! component-framework projects.

mod cli;
mod compiler;
mod config;
mod core;
mod diagnostics;
mod engine;
mod freshness;
mod host;
mod logger;
mod reload;
mod resource;
mod service;
mod style;
#[cfg(test)]
mod testkit;
mod typecheck;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;

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

    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };

    match &cli.command {
        Commands::Build { out_dir } => cli::build::build_project(&config, out_dir.as_deref()),
        Commands::Serve { port } => cli::serve::serve_project(&config, *port),
    }
}
