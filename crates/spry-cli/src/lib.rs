//! spry - static asset dev server with change-triggered rebuild and live reload.
//!
//! The binary wires configuration from `spry-config` and build tasks from
//! `spry-pipeline` into a running dev server:
//!
//! - [`cli`] - Command-line definition
//! - [`commands`] - `dev`, `build`, `clean` and `check`
//! - [`dev`] - File watcher, static file server, live reload and the
//!   orchestrator tying them together
//! - [`error`] - Error types and miette rendering
//! - [`logger`] - `tracing` subscriber setup
//! - [`ui`] - Terminal status messages
//!
//! # Example
//!
//! ```no_run
//! use spry_cli::dev::{DevConfig, DevServerOrchestrator};
//! use spry_config::ConfigDiscovery;
//!
//! # async fn run() -> spry_cli::Result<()> {
//! let project = ConfigDiscovery::new(".").load(&Default::default())?;
//! let config = DevConfig::from_config(project, false)?;
//! let handle = DevServerOrchestrator::new(config)?.start().await?;
//! println!("listening on {}", handle.url());
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
