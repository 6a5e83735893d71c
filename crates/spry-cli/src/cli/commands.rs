use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use spry_config::ConfigOverrides;

/// Available spry subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dev server
    ///
    /// Builds every task, serves the root directory, watches task globs and
    /// pushes reload notifications to connected browsers. Runs until Ctrl+C.
    Dev(DevArgs),

    /// Run every build task once and exit
    Build(BuildArgs),

    /// Delete the configured clean directory
    Clean(CleanArgs),

    /// Validate configuration and print the task plan
    Check(CheckArgs),
}

/// Options shared by every command for locating the configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file (spry.toml or package.json)
    ///
    /// Defaults to spry.toml in the current directory, then the "spry"
    /// field of package.json.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Arguments for the dev command
#[derive(Args, Debug, Clone)]
pub struct DevArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory to serve (overrides rootPath)
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// HTTP port (overrides port and SPRY_PORT)
    #[arg(short, long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// File served for directory requests instead of index.html
    #[arg(long, value_name = "FILE")]
    pub index: Option<String>,

    /// Serve and rebuild without pushing reload notifications
    #[arg(long)]
    pub no_live_reload: bool,

    /// Delete the clean directory before the initial build
    #[arg(long)]
    pub clean: bool,
}

impl DevArgs {
    /// Flags layered over file and environment configuration.
    ///
    /// `--root` is relative to `cwd`, not to the config file.
    pub fn overrides(&self, cwd: &Path) -> ConfigOverrides {
        ConfigOverrides {
            root_path: self.root.as_ref().map(|root| cwd.join(root)),
            port: self.port,
            index_document: self.index.clone(),
            live_reload: self.no_live_reload.then_some(false),
        }
    }
}

/// Arguments for the build command
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Delete the clean directory first
    #[arg(long)]
    pub clean: bool,
}

/// Arguments for the clean command
#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the check command
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}
