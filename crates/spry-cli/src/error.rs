//! Error handling for the spry CLI.
//!
//! [`CliError`] is the top-level error returned by commands and the dev
//! server. Domain errors from the config and pipeline crates convert into it
//! via `#[from]`; [`ResultExt`] prefixes context on the way up.
//!
//! # Example
//!
//! ```rust,no_run
//! use spry_cli::error::{Result, ResultExt};
//!
//! fn cwd() -> Result<std::path::PathBuf> {
//!     std::env::current_dir().context("Failed to read the current directory")
//! }
//! ```

pub mod miette;

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub use spry_config::ConfigError;
pub use spry_pipeline::{CleanError, TransformError};

pub use crate::dev::watcher::WatchError;
pub use self::miette::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A build task failed
    #[error("Build error: {0}")]
    Transform(#[from] TransformError),

    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}\n\nHint: Is another server already using this port? Try --port <PORT>")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The served root directory is missing
    #[error("Root directory not found: {}\n\nHint: Check 'rootPath' in your config or pass --root <DIR>", .0.display())]
    Path(PathBuf),

    /// The file watcher failed
    #[error("File watcher error: {0}")]
    Watch(#[from] WatchError),

    /// The clean directory could not be removed
    #[error("Clean failed: {0}")]
    Clean(#[from] CleanError),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors after startup
    #[error("Server error: {0}")]
    Server(String),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Replace the error with a custom message, keeping the original as detail.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CliError>,
{
    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| CliError::Custom(format!("{}: {}", msg, e.into())))
    }
}
