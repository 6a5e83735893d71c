//! Shared helpers for command implementations.

use std::path::PathBuf;

use spry_config::{ConfigDiscovery, ConfigOverrides, SpryConfig};
use spry_pipeline::clean_dir;

use crate::cli::ConfigArgs;
use crate::error::{Result, ResultExt};
use crate::ui;

/// Current working directory.
pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to read the current directory")
}

/// Locate, layer and validate the configuration.
///
/// An explicit `--config` path wins over discovery in the current directory.
pub fn load_config(args: &ConfigArgs, overrides: &ConfigOverrides) -> Result<SpryConfig> {
    let mut discovery = ConfigDiscovery::new(get_cwd()?);
    if let Some(path) = &args.config {
        discovery = discovery.with_file(path);
    }
    Ok(discovery.load(overrides)?)
}

/// Delete the configured clean directory, reporting what happened.
pub fn clean_project(config: &SpryConfig) -> Result<()> {
    let Some(dir) = config.clean_path() else {
        ui::warning("No cleanDir configured, nothing to clean");
        return Ok(());
    };

    if clean_dir(&dir, &config.base_dir)? {
        ui::success(&format!("Removed {}", dir.display()));
    } else {
        ui::info(&format!("{} does not exist, nothing to clean", dir.display()));
    }
    Ok(())
}
