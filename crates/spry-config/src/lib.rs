//! Configuration for the spry dev server.
//!
//! - [`config`] - the schema (`spry.toml` / `package.json#spry`)
//! - [`discovery`] - finding and layering config sources
//! - [`graph`] - resolving `dependsOn` into a run order
//! - [`validation`] - logical checks run after loading

pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod validation;

pub use config::*;
pub use discovery::{CONFIG_FILE, ConfigDiscovery, ENV_PREFIX};
pub use error::*;
pub use graph::resolve_run_order;
pub use validation::validate_task;
