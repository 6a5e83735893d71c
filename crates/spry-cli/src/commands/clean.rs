//! Clean command implementation.

use spry_config::ConfigOverrides;

use crate::cli::CleanArgs;
use crate::commands::utils;
use crate::error::Result;

/// Execute the clean command.
///
/// # Errors
///
/// Refuses to delete the project directory or anything outside it.
pub async fn execute(args: CleanArgs) -> Result<()> {
    let config = utils::load_config(&args.config, &ConfigOverrides::default())?;
    utils::clean_project(&config)
}
