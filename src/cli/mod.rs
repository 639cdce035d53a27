//! Command-line interface definitions.

pub mod build;
pub mod serve;

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

/// Reflow incremental compiler CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: search upward for reflow.toml)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the project once and write outputs to disk
    #[command(visible_alias = "b")]
    Build {
        /// Output directory (overrides [build].out_dir)
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        out_dir: Option<PathBuf>,
    },

    /// Watch sources, recompile incrementally and push reload signals
    #[command(visible_alias = "s")]
    Serve {
        /// WebSocket port (overrides [serve].ws_port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
