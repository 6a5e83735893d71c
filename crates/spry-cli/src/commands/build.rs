//! Build command implementation.
//!
//! Runs every task once in dependency order, without serving or watching.

use std::time::Instant;

use spry_config::ConfigOverrides;
use spry_pipeline::{BuildTask, TransformError};

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Execute the build command.
///
/// # Process Flow
///
/// 1. Load and validate configuration
/// 2. Delete the clean directory when `--clean` is given
/// 3. Run each task after its dependencies, stopping at the first failure
///
/// # Errors
///
/// Returns the first task failure, naming the task, stage and file.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let config = utils::load_config(&args.config, &ConfigOverrides::default())?;

    if args.clean {
        utils::clean_project(&config)?;
    }

    let start = Instant::now();
    let mut built = 0usize;
    let mut buildable = 0usize;

    for idx in config.run_order()? {
        let task = &config.tasks[idx];
        let Some(build) = BuildTask::from_config(task, &config)? else {
            tracing::debug!(task = %task.name, "reload-only task, nothing to build");
            continue;
        };
        buildable += 1;

        let name = task.name.clone();
        let report = tokio::task::spawn_blocking(move || build.run())
            .await
            .map_err(|e| TransformError::new(name, "run", e))??;

        if report.is_skipped() {
            ui::warning(&format!(
                "{}: no input files matched {}, nothing built",
                report.task,
                task.input_globs().join(", ")
            ));
            continue;
        }

        ui::success(&format!(
            "{} → {} ({} input{}, {}, {})",
            report.task,
            report.output.display(),
            report.inputs,
            if report.inputs == 1 { "" } else { "s" },
            ui::format_size(report.bytes as u64),
            ui::format_duration(report.duration)
        ));
        if let Some(map) = &report.source_map {
            tracing::debug!(map = %map.display(), "wrote source map");
        }
        built += 1;
    }

    if buildable == 0 {
        ui::warning("No build tasks configured");
    } else if built > 0 {
        ui::success(&format!(
            "Built {} task{} in {}",
            built,
            if built == 1 { "" } else { "s" },
            ui::format_duration(start.elapsed())
        ));
    }
    Ok(())
}
