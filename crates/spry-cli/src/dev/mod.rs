//! Development server.
//!
//! - [`watcher`]: debounced file change detection mapped to tasks
//! - [`reload`]: server-sent live reload notifications
//! - [`server`]: static file serving
//! - [`orchestrator`]: builds, serving and reloads tied together

pub mod config;
pub mod orchestrator;
pub mod reload;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod watcher;

pub use config::{DevConfig, LiveReload, ServerConfig};
pub use orchestrator::{DevServerHandle, DevServerOrchestrator};
pub use reload::{LiveReloadChannel, Reload, ReloadScope, ReloadSession};
pub use server::{ServerHandle, StaticFileServer};
pub use shutdown::Shutdown;
pub use state::{Phase, PhaseState};
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher, RuleSet, WatchError, WatchOptions};
