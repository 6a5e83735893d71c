//! Configuration schema for the spry dev server.
//!
//! A config describes one static root served over HTTP plus a list of build
//! tasks. Every key is camelCase so the same shape works in `spry.toml` and in
//! the `"spry"` field of `package.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpryConfig {
    /// Directory served by the static file server
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// File served for `/` instead of `index.html`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_document: Option<String>,

    /// Push reload notifications to connected browsers
    #[serde(default = "default_live_reload")]
    pub live_reload: bool,

    /// Dedicated live reload port; shares the HTTP port when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_reload_port: Option<u16>,

    /// Quiet period before a burst of file events becomes one change
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound on waiting for in-flight builds during shutdown
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Directory deleted by `clean`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskConfig>,

    /// Directory relative paths are resolved against. Set by discovery.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for SpryConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            port: default_port(),
            host: default_host(),
            index_document: None,
            live_reload: default_live_reload(),
            live_reload_port: None,
            debounce_ms: default_debounce_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            clean_dir: None,
            tasks: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl SpryConfig {
    /// Resolve a configured path against the config's base directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Absolute-or-base-relative static root.
    pub fn root_dir(&self) -> PathBuf {
        self.resolve(&self.root_path)
    }

    /// Resolved clean directory, if one is configured.
    pub fn clean_path(&self) -> Option<PathBuf> {
        self.clean_dir.as_ref().map(|dir| self.resolve(dir))
    }
}

/// One build task: sources, transform chain and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,

    /// Globs whose changes trigger this task
    #[serde(default)]
    pub watch: Vec<String>,

    /// Globs read as inputs; defaults to `watch`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform_chain: Vec<TransformSpec>,

    /// Output artifact. A task without one only triggers a page reload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Browserslist queries used by `autoprefix` and `minify`
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl TaskConfig {
    /// Create a reload-only task; add globs and stages with the `with_*` builders.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            watch: Vec::new(),
            inputs: None,
            transform_chain: Vec::new(),
            output: None,
            browsers: default_browsers(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_watch(mut self, pattern: impl Into<String>) -> Self {
        self.watch.push(pattern.into());
        self
    }

    pub fn with_inputs(mut self, patterns: Vec<String>) -> Self {
        self.inputs = Some(patterns);
        self
    }

    pub fn with_transform(mut self, spec: TransformSpec) -> Self {
        self.transform_chain.push(spec);
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_dependency(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    /// Globs expanded into the task's inputs.
    pub fn input_globs(&self) -> &[String] {
        self.inputs.as_deref().unwrap_or(&self.watch)
    }

    /// A task with no output only triggers a full page reload.
    pub fn is_reload_only(&self) -> bool {
        self.output.is_none()
    }

    /// The watch rules contributed by this task.
    pub fn watch_rules(&self) -> impl Iterator<Item = WatchRule> + '_ {
        self.watch.iter().map(|glob| WatchRule {
            glob: glob.clone(),
            task: self.name.clone(),
        })
    }
}

/// Glob pattern associated with the task it triggers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WatchRule {
    pub glob: String,
    pub task: String,
}

/// Source map placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// Base64 data URL appended to the output
    #[default]
    Inline,
    /// `<output>.map` next to the output
    External,
}

/// A configured transform stage.
///
/// Accepts either a bare stage name (`"minify"`) or a table with a `stage`
/// key and stage options (`{ stage = "concat", separator = "" }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum TransformSpec {
    Identity,
    Autoprefix,
    Concat { separator: String },
    Minify,
    Sourcemap { mode: SourceMapMode },
}

impl TransformSpec {
    pub fn concat() -> Self {
        TransformSpec::Concat {
            separator: default_separator(),
        }
    }

    pub fn sourcemap(mode: SourceMapMode) -> Self {
        TransformSpec::Sourcemap { mode }
    }

    /// Stage name used in config files and error reports.
    pub fn stage_name(&self) -> &'static str {
        match self {
            TransformSpec::Identity => "identity",
            TransformSpec::Autoprefix => "autoprefix",
            TransformSpec::Concat { .. } => "concat",
            TransformSpec::Minify => "minify",
            TransformSpec::Sourcemap { .. } => "sourcemap",
        }
    }

    fn from_parts(
        stage: &str,
        separator: Option<String>,
        mode: Option<SourceMapMode>,
    ) -> Result<Self, String> {
        match stage {
            "identity" => Ok(TransformSpec::Identity),
            "autoprefix" => Ok(TransformSpec::Autoprefix),
            "concat" => Ok(TransformSpec::Concat {
                separator: separator.unwrap_or_else(default_separator),
            }),
            "minify" => Ok(TransformSpec::Minify),
            "sourcemap" => Ok(TransformSpec::Sourcemap {
                mode: mode.unwrap_or_default(),
            }),
            other => Err(format!(
                "unknown transform stage '{}' (expected identity, autoprefix, concat, minify or sourcemap)",
                other
            )),
        }
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage_name())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTransform {
    Name(String),
    Table(TransformTable),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TransformTable {
    stage: String,
    #[serde(default)]
    separator: Option<String>,
    #[serde(default)]
    mode: Option<SourceMapMode>,
}

impl<'de> Deserialize<'de> for TransformSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawTransform::deserialize(deserializer)?;
        TransformSpec::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<RawTransform> for TransformSpec {
    type Error = String;

    fn try_from(raw: RawTransform) -> Result<Self, Self::Error> {
        match raw {
            RawTransform::Name(name) => TransformSpec::from_parts(&name, None, None),
            RawTransform::Table(table) => {
                if table.mode.is_some() && table.stage != "sourcemap" {
                    return Err(format!("stage '{}' does not take a mode", table.stage));
                }
                if table.separator.is_some() && table.stage != "concat" {
                    return Err(format!("stage '{}' does not take a separator", table.stage));
                }
                TransformSpec::from_parts(&table.stage, table.separator, table.mode)
            }
        }
    }
}

/// Command-line overrides layered on top of file and environment values.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_reload: Option<bool>,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_live_reload() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_browsers() -> Vec<String> {
    vec!["defaults".to_string()]
}

fn default_separator() -> String {
    "\n".to_string()
}
