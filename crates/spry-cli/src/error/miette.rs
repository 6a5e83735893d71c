//! Miette diagnostic conversion for CLI errors.

use miette::Report;

use crate::error::CliError;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Transform(e) => {
            let file = e
                .file
                .as_ref()
                .map(|file| format!("\nFile: {}", file.display()))
                .unwrap_or_default();
            miette::miette!(
                "Task '{}' failed in stage '{}'{}\n\n{}",
                e.task,
                e.stage,
                file,
                e.cause
            )
        }
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        _ => miette::miette!("{}", err),
    }
}
