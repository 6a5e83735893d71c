//! Development server configuration.
//!
//! Built from a loaded [`SpryConfig`] by the entry point and handed to the
//! orchestrator; nothing reads configuration globally.

use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use spry_config::{ConfigError, SpryConfig};

use crate::error::Result;

const DEFAULT_INDEX: &str = "index.html";

/// Static file server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory served
    pub root: PathBuf,
    /// Listen address. Port 0 requests an ephemeral port.
    pub addr: SocketAddr,
    /// File served for `/` and directory requests
    pub index_document: Option<String>,
}

impl ServerConfig {
    pub fn new(root: impl Into<PathBuf>, addr: SocketAddr) -> Self {
        Self {
            root: root.into(),
            addr,
            index_document: None,
        }
    }

    pub fn with_index_document(mut self, name: impl Into<String>) -> Self {
        self.index_document = Some(name.into());
        self
    }

    /// The index document name, `index.html` unless overridden.
    pub fn index(&self) -> &str {
        self.index_document.as_deref().unwrap_or(DEFAULT_INDEX)
    }
}

/// Where live reload is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveReload {
    Disabled,
    /// Mounted on the static file server
    Shared,
    /// Separate listener
    Dedicated(SocketAddr),
}

/// Everything the orchestrator needs to run.
#[derive(Debug, Clone)]
pub struct DevConfig {
    pub server: ServerConfig,
    pub live_reload: LiveReload,
    pub debounce: Duration,
    /// Upper bound on waiting for in-flight builds when stopping
    pub shutdown_grace: Duration,
    /// Delete the clean directory before the initial build
    pub clean: bool,
    /// Tasks, paths and the rest of the loaded configuration
    pub project: SpryConfig,
}

impl DevConfig {
    /// Derive the dev server settings from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error when `host` is not an IP address.
    pub fn from_config(project: SpryConfig, clean: bool) -> Result<Self> {
        let host: IpAddr = project
            .host
            .parse()
            .map_err(|_| ConfigError::invalid("host", format!("'{}' is not an IP address", project.host)))?;

        let mut server = ServerConfig::new(normalize(&project.root_dir()), SocketAddr::new(host, project.port));
        server.index_document = project.index_document.clone();

        let live_reload = match (project.live_reload, project.live_reload_port) {
            (false, _) => LiveReload::Disabled,
            (true, None) => LiveReload::Shared,
            (true, Some(port)) => LiveReload::Dedicated(SocketAddr::new(host, port)),
        };

        Ok(Self {
            server,
            live_reload,
            debounce: Duration::from_millis(project.debounce_ms),
            shutdown_grace: Duration::from_millis(project.shutdown_grace_ms),
            clean,
            project,
        })
    }

    /// URL path of a file under the served root, e.g. `/dist/styles.css`.
    pub fn url_path(&self, file: &Path) -> Option<String> {
        let relative = normalize(file).strip_prefix(&self.server.root).ok()?.to_path_buf();
        let segments: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("/{}", segments.join("/")))
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> SpryConfig {
        SpryConfig {
            root_path: PathBuf::from("app"),
            base_dir: PathBuf::from("/site"),
            ..SpryConfig::default()
        }
    }

    #[test]
    fn shares_transport_by_default() {
        let config = DevConfig::from_config(project(), false).unwrap();
        assert_eq!(config.live_reload, LiveReload::Shared);
        assert_eq!(config.server.addr, "127.0.0.1:3000".parse::<std::net::SocketAddr>().unwrap());
        assert_eq!(config.server.root, PathBuf::from("/site/app"));
        assert_eq!(config.server.index(), "index.html");
        assert_eq!(config.debounce, Duration::from_millis(100));
    }

    #[test]
    fn dedicated_and_disabled_live_reload() {
        let mut dedicated = project();
        dedicated.live_reload_port = Some(35729);
        let config = DevConfig::from_config(dedicated, false).unwrap();
        assert_eq!(config.live_reload, LiveReload::Dedicated("127.0.0.1:35729".parse().unwrap()));

        let mut disabled = project();
        disabled.live_reload = false;
        disabled.live_reload_port = Some(35729);
        let config = DevConfig::from_config(disabled, false).unwrap();
        assert_eq!(config.live_reload, LiveReload::Disabled);
    }

    #[test]
    fn rejects_hostname() {
        let mut config = project();
        config.host = "localhost".into();
        assert!(DevConfig::from_config(config, false).is_err());
    }

    #[test]
    fn url_path_is_relative_to_root() {
        let config = DevConfig::from_config(project(), false).unwrap();
        assert_eq!(
            config.url_path(Path::new("/site/app/./dist/../dist/styles.css")).as_deref(),
            Some("/dist/styles.css")
        );
        assert_eq!(config.url_path(Path::new("/site/build/styles.css")), None);
    }

    #[test]
    fn normalize_keeps_leading_parents() {
        assert_eq!(normalize(Path::new("./a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }
}
