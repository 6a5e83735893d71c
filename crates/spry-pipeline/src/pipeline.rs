//! Running a build task end to end: load, transform, write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use spry_config::{ConfigError, SourceMapMode, SpryConfig, TaskConfig};
use tempfile::NamedTempFile;

use crate::artifact::{Artifact, PieceError, SourceFile};
use crate::error::TransformError;
use crate::inputs::expand_inputs;
use crate::transforms::{Transform, TransformChain, build_chain};

/// A build task with resolved paths and a constructed transform chain.
///
/// Inputs stay as globs and are expanded on every run, so files added or
/// removed between runs are picked up.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub name: String,
    /// Directory globs and source map paths are relative to
    pub base_dir: PathBuf,
    pub inputs: Vec<String>,
    pub output: PathBuf,
    pub chain: TransformChain,
}

/// Outcome of a successful run.
///
/// A run whose globs matched no files writes nothing and reports zero inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub task: String,
    pub output: PathBuf,
    /// External map written next to the output
    pub source_map: Option<PathBuf>,
    pub inputs: usize,
    /// Size of the written output
    pub bytes: usize,
    pub duration: Duration,
}

impl BuildReport {
    /// True when no input matched and the output was left as it was.
    pub fn is_skipped(&self) -> bool {
        self.inputs == 0
    }
}

impl BuildTask {
    pub fn new(
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        inputs: Vec<String>,
        output: impl Into<PathBuf>,
        chain: TransformChain,
    ) -> Self {
        Self {
            name: name.into(),
            base_dir: base_dir.into(),
            inputs,
            output: output.into(),
            chain,
        }
    }

    /// Build the runnable form of a configured task.
    ///
    /// # Returns
    ///
    /// `None` for a reload-only task, which has nothing to build.
    ///
    /// # Errors
    ///
    /// Returns an error when the task's browserslist queries don't resolve.
    pub fn from_config(task: &TaskConfig, config: &SpryConfig) -> Result<Option<Self>, ConfigError> {
        let Some(output) = &task.output else {
            return Ok(None);
        };
        let chain = build_chain(&task.transform_chain, &task.browsers)?;

        Ok(Some(Self::new(
            task.name.clone(),
            config.base_dir.clone(),
            task.input_globs().to_vec(),
            config.resolve(output),
            chain,
        )))
    }

    /// Append a custom stage after the configured ones.
    pub fn with_stage(mut self, stage: Arc<dyn Transform>) -> Self {
        let mut stages = self.chain.to_vec();
        stages.push(stage);
        self.chain = stages.into();
        self
    }

    /// Path of the external source map for this task's output.
    pub fn map_path(&self) -> PathBuf {
        let mut name = self.output.clone().into_os_string();
        name.push(".map");
        PathBuf::from(name)
    }

    /// Load the inputs, apply every stage and write the result.
    ///
    /// The output (and its map) is replaced atomically, and only when every
    /// stage succeeded. On failure the previous output stays in place.
    ///
    /// When the globs match nothing the run is skipped: no stage runs, nothing
    /// is written and the report has zero inputs. A later run picks the files
    /// up once they exist.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] naming the failing stage: `load` when an
    /// input can't be read, the transform's name when a stage fails, or
    /// `write` when the output can't be replaced.
    pub fn run(&self) -> Result<BuildReport, TransformError> {
        let start = Instant::now();

        let sources = self.load()?;
        let input_count = sources.len();
        if sources.is_empty() {
            tracing::warn!(task = %self.name, globs = %self.inputs.join(", "), "no input files matched, skipping");
            return Ok(BuildReport {
                task: self.name.clone(),
                output: self.output.clone(),
                source_map: None,
                inputs: 0,
                bytes: 0,
                duration: start.elapsed(),
            });
        }
        let file_name = self
            .output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut artifact = Artifact::from_sources(sources, file_name);
        for stage in self.chain.iter() {
            artifact = stage.apply(artifact).map_err(|cause| {
                let file = cause.downcast_ref::<PieceError>().map(|piece| piece.path.clone());
                let err = TransformError::new(&self.name, stage.name(), cause);
                match file {
                    Some(file) => err.with_file(file),
                    None => err,
                }
            })?;
            tracing::trace!(task = %self.name, stage = stage.name(), "stage complete");
        }

        let (bytes, source_map) = self.write(&artifact).map_err(|e| TransformError::write(&self.name, e))?;

        let report = BuildReport {
            task: self.name.clone(),
            output: self.output.clone(),
            source_map,
            inputs: input_count,
            bytes,
            duration: start.elapsed(),
        };
        tracing::debug!(
            task = %report.task,
            output = %report.output.display(),
            bytes = report.bytes,
            duration_ms = report.duration.as_millis() as u64,
            "task built"
        );
        Ok(report)
    }

    fn load(&self) -> Result<Vec<SourceFile>, TransformError> {
        let map_path = self.map_path();
        let mut paths =
            expand_inputs(&self.base_dir, &self.inputs).map_err(|e| TransformError::load(&self.name, e))?;
        // An output under an input glob must not feed the next run.
        paths.retain(|path| *path != self.output && *path != map_path);

        paths
            .into_iter()
            .map(|path| {
                let content = fs::read_to_string(&path)
                    .map_err(|e| TransformError::load(&self.name, e).with_file(&path))?;
                let name = source_name(&self.base_dir, &path);
                Ok(SourceFile::new(path, name, content))
            })
            .collect()
    }

    fn write(&self, artifact: &Artifact) -> std::io::Result<(usize, Option<PathBuf>)> {
        let mut text = artifact.render();
        let mut external = None;

        if let Some(map) = &artifact.source_map {
            let url = match map.mode {
                SourceMapMode::Inline => map.data_url.clone(),
                SourceMapMode::External => {
                    let path = self.map_path();
                    let url = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    external = Some((path, map.json.as_bytes()));
                    url
                }
            };
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("/*# sourceMappingURL={} */\n", url));
        }

        // Stage both files before replacing either, so a failed write leaves
        // the previous pair in place.
        let output = stage(&self.output, text.as_bytes())?;
        let map = match &external {
            Some((path, json)) => Some((stage(path, json)?, path.clone())),
            None => None,
        };

        output.persist(&self.output).map_err(|e| e.error)?;
        let map_path = match map {
            Some((file, path)) => {
                file.persist(&path).map_err(|e| e.error)?;
                Some(path)
            }
            None => None,
        };
        Ok((text.len(), map_path))
    }
}

/// Source path as recorded in maps: relative to the base, with `/` separators.
fn source_name(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `contents` to a synced temp file beside `path`, ready to persist.
///
/// Persisting renames over `path`, so readers see either the old file or the
/// complete new one.
fn stage(path: &Path, contents: &[u8]) -> std::io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn map_path_appends_extension() {
        let task = BuildTask::new("css", "/p", vec![], "/p/dist/site.css", build_chain(&[], &[]).unwrap());
        assert_eq!(task.map_path(), PathBuf::from("/p/dist/site.css.map"));
    }

    #[test]
    fn custom_stage_runs_last() {
        let chain = build_chain(&[spry_config::TransformSpec::Identity], &[]).unwrap();
        let task = BuildTask::new("css", "/p", vec![], "/p/out.css", chain)
            .with_stage(Arc::new(crate::transforms::FnTransform::new("upper", |text| Ok(text.to_uppercase()))));

        let names: Vec<_> = task.chain.iter().map(|stage| stage.name()).collect();
        assert_eq!(names, ["identity", "upper"]);
    }

    #[test]
    fn source_names_are_relative() {
        assert_eq!(
            source_name(Path::new("/p"), Path::new("/p/app/styles/a.css")),
            "app/styles/a.css"
        );
    }

    #[test]
    fn staged_files_create_parent_and_replace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dist/out.css");

        stage(&path, b"first").unwrap().persist(&path).unwrap();
        stage(&path, b"second").unwrap().persist(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("dist")).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn reload_only_task_has_nothing_to_build() {
        let config = SpryConfig::default();
        let task = TaskConfig::new("html").with_watch("app/**/*.html");
        assert!(BuildTask::from_config(&task, &config).unwrap().is_none());
    }
}
