//! Command-line interface definition for spry.
//!
//! # Command Structure
//!
//! - `spry dev` - Serve the site, rebuild on change, push live reloads
//! - `spry build` - Run every task once in dependency order
//! - `spry clean` - Delete the configured clean directory
//! - `spry check` - Validate configuration and show the task plan

mod commands;

use clap::Parser;

pub use commands::{BuildArgs, CheckArgs, CleanArgs, Command, ConfigArgs, DevArgs};

/// spry - static asset dev server with rebuild and live reload
#[derive(Parser, Debug)]
#[command(
    name = "spry",
    version,
    about = "Static asset dev server with rebuild and live reload",
    long_about = "spry serves a directory over HTTP, rebuilds CSS when sources change\n\
                  (prefixing, concatenation, minification, source maps) and tells\n\
                  connected browsers to reload."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
