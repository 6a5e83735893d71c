//! File-based config discovery for CLI use
//!
//! Finds a spry configuration file and layers it with environment and
//! command-line values. Priority: CLI > environment > file > defaults.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml};
use serde_json::Value;

use crate::config::{ConfigOverrides, SpryConfig};
use crate::error::{ConfigError, Result};

/// Name of the TOML config file searched for in the project directory.
pub const CONFIG_FILE: &str = "spry.toml";

/// Prefix of environment variables that override config values.
pub const ENV_PREFIX: &str = "SPRY_";

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use spry_config::{ConfigDiscovery, ConfigOverrides};
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load(&ConfigOverrides::default()).unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
    explicit: Option<PathBuf>,
}

impl ConfigDiscovery {
    /// Create a new config discovery with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            explicit: None,
        }
    }

    /// Use a specific config file instead of searching.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit = Some(path.as_ref().to_path_buf());
        self
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. TOML config: spry.toml
    /// 2. package.json (spry field)
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.exists() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get("spry").is_some_and(|v| !v.is_null()) {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Load and validate the configuration.
    ///
    /// Without a config file the defaults apply, with relative paths resolved
    /// against the discovery root. An explicit file that does not exist is an
    /// error.
    pub fn load(&self, overrides: &ConfigOverrides) -> Result<SpryConfig> {
        let file = match &self.explicit {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.clone())),
            Some(path) => Some(path.clone()),
            None => self.find(),
        };

        let mut figment = Figment::new().merge(Serialized::defaults(SpryConfig::default()));

        let base_dir = match &file {
            Some(path) => {
                figment = figment.merge(Self::file_provider(path)?);
                tracing::debug!(config = %path.display(), "loaded configuration file");
                path.parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone())
            }
            None => {
                tracing::debug!(root = %self.root.display(), "no configuration file, using defaults");
                self.root.clone()
            }
        };

        let mut config: SpryConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).only(&["port"]))
            .merge(Serialized::defaults(overrides))
            .extract()?;

        config.base_dir = if base_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            base_dir
        };
        config.validate()?;
        Ok(config)
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        let is_package_json = path.file_name() == Some(std::ffi::OsStr::new("package.json"));
        if is_package_json {
            let content = fs::read_to_string(path)?;
            let parsed: Value = serde_json::from_str(&content).map_err(|e| {
                ConfigError::invalid("package.json", format!("Invalid JSON: {}", e))
            })?;
            let spry = parsed
                .get("spry")
                .filter(|v| !v.is_null())
                .ok_or_else(|| {
                    ConfigError::invalid("spry", "Add a 'spry' field to your package.json")
                })?;
            return Ok(Figment::from(Json::string(&spry.to_string())));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Figment::from(Toml::file_exact(path))),
            Some("json") => Ok(Figment::from(Json::file_exact(path))),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
