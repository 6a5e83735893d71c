//! Logical validation of a loaded configuration.
//!
//! Only checks what can be decided without touching the filesystem. Whether
//! the root directory exists is decided when the server starts.

use std::collections::HashSet;

use crate::config::{SpryConfig, TaskConfig, TransformSpec};
use crate::error::{ConfigError, Result};
use crate::graph::resolve_run_order;

impl SpryConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must be between 1 and 65535"));
        }

        if self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::invalid(
                "host",
                format!("'{}' is not an IP address", self.host),
            ));
        }

        if let Some(index) = &self.index_document {
            validate_index_document(index)?;
        }

        if self.live_reload_port.is_some_and(|port| port == 0 || port == self.port) {
            return Err(ConfigError::invalid(
                "liveReloadPort",
                "must be non-zero and differ from port",
            ));
        }

        if self.debounce_ms == 0 {
            return Err(ConfigError::invalid("debounceMs", "must be at least 1"));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(ConfigError::DuplicateTask(task.name.clone()));
            }
            validate_task(task)?;
        }

        resolve_run_order(&self.tasks)?;
        Ok(())
    }

    /// Task indices in the order they run at startup.
    pub fn run_order(&self) -> Result<Vec<usize>> {
        resolve_run_order(&self.tasks)
    }
}

fn validate_index_document(index: &str) -> Result<()> {
    let plain = !index.is_empty()
        && !index.contains(['/', '\\'])
        && index != "."
        && index != "..";
    if plain {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "indexDocument",
            format!("'{}' must be a plain file name", index),
        ))
    }
}

/// Validate one task's shape and transform chain ordering.
pub fn validate_task(task: &TaskConfig) -> Result<()> {
    if task.name.trim().is_empty() {
        return Err(ConfigError::invalid("tasks.name", "task names cannot be empty"));
    }

    let chain_error = |reason: String| ConfigError::InvalidChain {
        task: task.name.clone(),
        reason,
    };

    if task.is_reload_only() {
        if !task.transform_chain.is_empty() {
            return Err(chain_error(
                "a transform chain needs an output path".to_string(),
            ));
        }
        return Ok(());
    }

    if task.input_globs().is_empty() {
        return Err(ConfigError::invalid(
            format!("tasks.{}.inputs", task.name),
            "a task with an output needs at least one input or watch glob",
        ));
    }

    let position = |stage: &str| {
        task.transform_chain
            .iter()
            .position(|spec| spec.stage_name() == stage)
    };

    let mut stages = HashSet::new();
    for spec in &task.transform_chain {
        if !stages.insert(spec.stage_name()) {
            return Err(chain_error(format!(
                "stage '{}' appears more than once",
                spec.stage_name()
            )));
        }
    }

    if let (Some(prefix), Some(minify)) = (position("autoprefix"), position("minify")) {
        if prefix > minify {
            return Err(chain_error(
                "autoprefix must run before minify".to_string(),
            ));
        }
    }

    if let Some(sourcemap) = position("sourcemap") {
        if sourcemap + 1 != task.transform_chain.len() {
            return Err(chain_error(
                "sourcemap must be the last stage".to_string(),
            ));
        }
    }

    let needs_browsers = task
        .transform_chain
        .iter()
        .any(|spec| matches!(spec, TransformSpec::Autoprefix | TransformSpec::Minify));
    if needs_browsers && task.browsers.is_empty() {
        return Err(ConfigError::invalid(
            format!("tasks.{}.browsers", task.name),
            "autoprefix and minify need at least one browserslist query",
        ));
    }

    Ok(())
}
