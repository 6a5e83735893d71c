//! Check command implementation.
//!
//! Validates configuration and prints the task plan without building.

use spry_config::{ConfigError, ConfigOverrides, SpryConfig, TaskConfig};
use spry_pipeline::expand_inputs;

use crate::cli::CheckArgs;
use crate::commands::utils;
use crate::error::{CliError, Result};
use crate::ui;

/// Execute the check command.
///
/// # Validation Steps
///
/// 1. Load and validate the configuration (dependency cycles, unknown
///    dependencies and transform chains are rejected here)
/// 2. Check that the served root exists
/// 3. Print tasks in run order and the watch rules to stdout
/// 4. Warn about globs that match nothing
///
/// # Errors
///
/// Returns errors for invalid configuration, malformed globs or a missing root.
pub async fn execute(args: CheckArgs) -> Result<()> {
    ui::info("Checking configuration...");
    let config = utils::load_config(&args.config, &ConfigOverrides::default())?;
    ui::success("Configuration is valid");

    let root = config.root_dir();
    if !root.is_dir() {
        return Err(CliError::Path(root));
    }

    println!("root: {}", root.display());
    println!("url:  http://{}:{}", config.host, config.port);

    let order = config.run_order()?;
    if order.is_empty() {
        println!("tasks: none");
    } else {
        println!("tasks:");
    }
    for (step, idx) in order.into_iter().enumerate() {
        let task = &config.tasks[idx];
        println!("  {}. {}", step + 1, describe(task));
        warn_unmatched(&config, task)?;
    }

    let rules: Vec<_> = config.tasks.iter().flat_map(TaskConfig::watch_rules).collect();
    if !rules.is_empty() {
        println!("watch:");
    }
    for rule in rules {
        println!("  {} -> {}", rule.glob, rule.task);
    }

    Ok(())
}

fn describe(task: &TaskConfig) -> String {
    let Some(output) = &task.output else {
        return format!("{} [reload]", task.name);
    };

    let chain = if task.transform_chain.is_empty() {
        "identity".to_string()
    } else {
        task.transform_chain
            .iter()
            .map(|spec| spec.stage_name())
            .collect::<Vec<_>>()
            .join(" > ")
    };
    let mut line = format!(
        "{} [{}] {} -> {}",
        task.name,
        chain,
        task.input_globs().join(", "),
        output.display()
    );
    if !task.depends_on.is_empty() {
        line.push_str(&format!(" (after {})", task.depends_on.join(", ")));
    }
    line
}

fn warn_unmatched(config: &SpryConfig, task: &TaskConfig) -> Result<()> {
    let globs = task.watch.iter().chain(task.inputs.iter().flatten());
    for glob in globs {
        let matched = expand_inputs(&config.base_dir, std::slice::from_ref(glob))
            .map_err(|e| ConfigError::invalid("watch", format!("invalid glob '{}': {}", glob, e)))?;
        if matched.is_empty() {
            ui::warning(&format!("Task '{}': '{}' matches no files", task.name, glob));
        }
    }
    Ok(())
}
