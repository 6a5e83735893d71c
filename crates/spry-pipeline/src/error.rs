//! Error types for the asset pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A pipeline run failed.
///
/// `stage` is `load`, `write`, or the name of the transform that failed.
/// When a run fails the output artifact is left as it was before the run.
#[derive(Debug, Error)]
#[error("task '{task}' failed in {stage}{}: {cause}", FileSuffix(.file.as_deref()))]
pub struct TransformError {
    pub task: String,
    pub stage: String,
    pub file: Option<PathBuf>,
    #[source]
    pub cause: BoxError,
}

impl TransformError {
    pub fn new(task: impl Into<String>, stage: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            task: task.into(),
            stage: stage.into(),
            file: None,
            cause: cause.into(),
        }
    }

    /// Attach the file being processed when the stage failed.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn load(task: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::new(task, STAGE_LOAD, cause)
    }

    pub fn write(task: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::new(task, STAGE_WRITE, cause)
    }
}

pub const STAGE_LOAD: &str = "load";
pub const STAGE_WRITE: &str = "write";

struct FileSuffix<'a>(Option<&'a Path>);

impl fmt::Display for FileSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, " ({})", path.display()),
            None => Ok(()),
        }
    }
}

/// Failure removing the clean directory.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("refusing to clean {path}: {reason}")]
    Refused { path: PathBuf, reason: &'static str },

    #[error("failed to remove {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
