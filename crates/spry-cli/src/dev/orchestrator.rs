//! Dev server orchestration.
//!
//! [`DevServerOrchestrator::start`] builds every task once, binds the static
//! file server and live reload, starts the watcher and hands back a
//! [`DevServerHandle`]. From then on an event loop turns debounced changes into
//! task runs and successful runs into reload notifications.
//!
//! Scheduling rules:
//!
//! - at most one run per task is in flight; a change during a run marks the
//!   task dirty and it runs exactly once more afterwards
//! - tasks writing the same output take turns on a per-output lock
//! - build work runs on the blocking pool

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use spry_config::{ConfigError, WatchRule};
use spry_pipeline::{BuildReport, BuildTask, Transform, TransformError, clean_dir};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use super::config::{DevConfig, LiveReload, normalize};
use super::reload::{LiveReloadChannel, Reload};
use super::server::{ServerHandle, StaticFileServer};
use super::shutdown::Shutdown;
use super::state::{Phase, PhaseState};
use super::watcher::{ChangeEvent, ChangeKind, FileWatcher, RuleSet, WatchError, WatchOptions};
use crate::error::{CliError, Result};
use crate::ui;

type TaskOutcome = std::result::Result<Option<BuildReport>, TransformError>;

/// Runtime view of one configured task.
#[derive(Debug, Clone)]
struct TaskSlot {
    name: String,
    /// `None` for reload-only tasks
    build: Option<BuildTask>,
    /// Notification sent after a successful run
    reload: Reload,
    /// Shared by every task writing the same output
    output_lock: Option<Arc<Mutex<()>>>,
    running: bool,
    dirty: bool,
}

/// Coordinates the watcher, pipeline, file server and live reload.
pub struct DevServerOrchestrator {
    config: DevConfig,
    slots: Vec<TaskSlot>,
    run_order: Vec<usize>,
    phase: PhaseState,
}

impl DevServerOrchestrator {
    /// Prepare tasks and their run order.
    ///
    /// # Errors
    ///
    /// Returns a config error for dependency cycles, unknown dependencies or
    /// browserslist queries that don't resolve.
    pub fn new(config: DevConfig) -> Result<Self> {
        let run_order = config.project.run_order()?;

        let mut locks: HashMap<PathBuf, Arc<Mutex<()>>> = HashMap::new();
        let mut slots = Vec::with_capacity(config.project.tasks.len());

        for task in &config.project.tasks {
            let build = BuildTask::from_config(task, &config.project)?;

            let (reload, output_lock) = match &build {
                None => (Reload::full(), None),
                Some(build) => {
                    let is_css = build.output.extension().is_some_and(|ext| ext == "css");
                    let reload = match config.url_path(&build.output) {
                        Some(url) if is_css => Reload::asset(url),
                        _ => Reload::full(),
                    };
                    let lock = locks.entry(normalize(&build.output)).or_default().clone();
                    (reload, Some(lock))
                }
            };

            slots.push(TaskSlot {
                name: task.name.clone(),
                build,
                reload,
                output_lock,
                running: false,
                dirty: false,
            });
        }

        Ok(Self {
            config,
            slots,
            run_order,
            phase: PhaseState::new(),
        })
    }

    /// Append a custom stage to a task's configured chain.
    ///
    /// # Errors
    ///
    /// Returns a config error when the task is unknown or reload-only.
    pub fn with_stage(mut self, task: &str, stage: Arc<dyn Transform>) -> Result<Self> {
        let field = format!("tasks.{}", task);
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.name == task)
            .ok_or_else(|| ConfigError::invalid(&field, "no task with this name"))?;
        let build = slot
            .build
            .take()
            .ok_or_else(|| ConfigError::invalid(&field, "reload-only tasks have no transform chain"))?;
        slot.build = Some(build.with_stage(stage));
        Ok(self)
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Phase transitions from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Build, bind and start watching.
    ///
    /// Returns once every listener is bound. Any failure on the way stops what
    /// was already started and returns to `Stopped`.
    pub async fn start(self) -> Result<DevServerHandle> {
        self.phase.set(Phase::Starting);

        let phase = self.phase.clone();
        match self.start_components().await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                phase.set(Phase::Stopped);
                Err(e)
            }
        }
    }

    async fn start_components(self) -> Result<DevServerHandle> {
        if self.config.clean {
            self.clean()?;
        }
        self.initial_build().await?;

        let reload = match self.config.live_reload {
            LiveReload::Disabled => None,
            LiveReload::Shared | LiveReload::Dedicated(_) => Some(LiveReloadChannel::new()),
        };
        let reload_addr = match (&reload, self.config.live_reload) {
            (Some(channel), LiveReload::Dedicated(addr)) => Some(channel.listen(addr).await?),
            _ => None,
        };

        let shared = match self.config.live_reload {
            LiveReload::Shared => reload.as_ref(),
            _ => None,
        };
        let mut server = match StaticFileServer::start(&self.config.server, shared).await {
            Ok(server) => server,
            Err(e) => {
                close_reload(reload.as_ref()).await;
                return Err(e);
            }
        };

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let mut watcher = match self.watch() {
            Ok(watcher) => watcher,
            Err(e) => {
                server.stop().await;
                close_reload(reload.as_ref()).await;
                return Err(e.into());
            }
        };
        watcher.on_change(move |event| {
            let _ = changes_tx.send(event.clone());
        });
        let errors = watcher.errors().unwrap_or_else(|| mpsc::unbounded_channel().1);

        let shutdown = Shutdown::new();
        let local_addr = server.local_addr();
        let index = self
            .slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (slot.name.clone(), idx))
            .collect();

        let event_loop = EventLoop {
            slots: self.slots,
            index,
            rules: watcher.rules().clone(),
            reload: reload.clone(),
            builds: JoinSet::new(),
            in_flight: HashMap::new(),
            changes: changes_rx,
            errors,
            shutdown: shutdown.subscribe(),
            watcher,
            server,
            grace: self.config.shutdown_grace,
            phase: self.phase.clone(),
        };

        self.phase.set(Phase::Running);
        let event_loop = tokio::spawn(event_loop.run());

        Ok(DevServerHandle {
            local_addr,
            reload_addr,
            reload,
            phase: self.phase,
            shutdown,
            event_loop: Some(event_loop),
        })
    }

    fn clean(&self) -> Result<()> {
        match self.config.project.clean_path() {
            Some(dir) => {
                if clean_dir(&dir, &self.config.project.base_dir)? {
                    ui::info(&format!("Cleaned {}", dir.display()));
                }
            }
            None => ui::warning("No cleanDir configured, skipping clean"),
        }
        Ok(())
    }

    async fn initial_build(&self) -> Result<()> {
        for &idx in &self.run_order {
            let slot = &self.slots[idx];
            let Some(build) = slot.build.clone() else {
                continue;
            };

            let name = slot.name.clone();
            let report = tokio::task::spawn_blocking(move || build.run())
                .await
                .map_err(|e| TransformError::new(name, "run", e))??;
            report_built(&report);
        }
        Ok(())
    }

    fn watch(&self) -> std::result::Result<FileWatcher, WatchError> {
        let rules: Vec<WatchRule> = self
            .config
            .project
            .tasks
            .iter()
            .flat_map(|task| task.watch_rules())
            .collect();

        let ignore = self
            .slots
            .iter()
            .filter_map(|slot| slot.build.as_ref())
            .flat_map(|build| [build.output.clone(), build.map_path()])
            .collect();

        FileWatcher::watch(
            &self.config.project.base_dir,
            rules,
            WatchOptions {
                debounce: self.config.debounce,
                ignore,
            },
        )
    }
}

/// A running dev server.
pub struct DevServerHandle {
    local_addr: SocketAddr,
    reload_addr: Option<SocketAddr>,
    reload: Option<LiveReloadChannel>,
    phase: PhaseState,
    shutdown: Shutdown,
    event_loop: Option<JoinHandle<Result<()>>>,
}

impl DevServerHandle {
    /// Bound address of the static file server.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Bound address of a dedicated live reload listener.
    pub fn reload_addr(&self) -> Option<SocketAddr> {
        self.reload_addr
    }

    pub fn reload_channel(&self) -> Option<&LiveReloadChannel> {
        self.reload.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Wait for the server to stop on its own, which only happens on a fatal
    /// watcher error. Cancel-safe.
    pub async fn wait(&mut self) -> Result<()> {
        let Some(event_loop) = self.event_loop.as_mut() else {
            return Ok(());
        };
        let outcome = event_loop.await;
        self.event_loop = None;
        outcome.map_err(|e| CliError::Server(format!("dev server task failed: {}", e)))?
    }

    /// Stop everything and wait for the shutdown sequence to finish.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown.trigger();
        self.wait().await
    }
}

struct EventLoop {
    slots: Vec<TaskSlot>,
    index: HashMap<String, usize>,
    rules: RuleSet,
    reload: Option<LiveReloadChannel>,
    builds: JoinSet<(usize, TaskOutcome)>,
    in_flight: HashMap<tokio::task::Id, usize>,
    changes: mpsc::UnboundedReceiver<ChangeEvent>,
    errors: mpsc::UnboundedReceiver<WatchError>,
    shutdown: broadcast::Receiver<()>,
    watcher: FileWatcher,
    server: ServerHandle,
    grace: Duration,
    phase: PhaseState,
}

impl EventLoop {
    async fn run(mut self) -> Result<()> {
        let result = loop {
            tokio::select! {
                _ = self.shutdown.recv() => break Ok(()),
                Some(err) = self.errors.recv() => {
                    ui::error(&format!("File watcher failed: {}", err));
                    break Err(CliError::Watch(err));
                }
                Some(event) = self.changes.recv() => self.on_change(event),
                Some(finished) = self.builds.join_next_with_id(), if !self.builds.is_empty() => {
                    self.on_finished(finished);
                }
            }
        };

        self.stop().await;
        result
    }

    fn on_change(&mut self, event: ChangeEvent) {
        let targets: Vec<usize> = self
            .rules
            .tasks_for(&event.path)
            .into_iter()
            .filter_map(|name| self.index.get(name).copied())
            .collect();

        let shown = event
            .path
            .strip_prefix(self.rules.root())
            .unwrap_or(&event.path)
            .display()
            .to_string();
        let verb = match event.kind {
            ChangeKind::Created => "Created",
            ChangeKind::Modified => "Changed",
            ChangeKind::Deleted => "Deleted",
        };
        ui::info(&format!("{} {}", verb, shown));

        for idx in targets {
            self.schedule(idx);
        }
    }

    fn schedule(&mut self, idx: usize) {
        let slot = &mut self.slots[idx];
        if slot.running {
            slot.dirty = true;
            tracing::debug!(task = %slot.name, "task running, queued another run");
            return;
        }

        slot.running = true;
        let run = run_task(slot.name.clone(), slot.build.clone(), slot.output_lock.clone());
        let handle = self.builds.spawn(async move { (idx, run.await) });
        self.in_flight.insert(handle.id(), idx);
    }

    fn on_finished(&mut self, finished: std::result::Result<(tokio::task::Id, (usize, TaskOutcome)), JoinError>) {
        let (idx, outcome) = match finished {
            Ok((id, (idx, outcome))) => {
                self.in_flight.remove(&id);
                (idx, outcome)
            }
            Err(e) => {
                let Some(idx) = self.in_flight.remove(&e.id()) else {
                    return;
                };
                let name = self.slots[idx].name.clone();
                (idx, Err(TransformError::new(name, "run", e)))
            }
        };

        let slot = &mut self.slots[idx];
        slot.running = false;

        match outcome {
            // A skipped run wrote nothing, so there is nothing to reload.
            Ok(Some(report)) if report.is_skipped() => report_built(&report),
            Ok(report) => {
                if let Some(report) = &report {
                    report_built(report);
                }
                if let Some(reload) = &self.reload {
                    reload.broadcast(&slot.reload);
                }
            }
            Err(e) => {
                tracing::error!(task = %e.task, stage = %e.stage, file = ?e.file, error = %e.cause, "task failed");
                ui::error(&e.to_string());
            }
        }

        if slot.dirty {
            slot.dirty = false;
            self.schedule(idx);
        }
    }

    /// Stop in order: watcher, in-flight builds, file server, live reload.
    async fn stop(&mut self) {
        self.phase.set(Phase::Stopping);

        self.watcher.stop();

        if !self.builds.is_empty() {
            let builds = &mut self.builds;
            let drained = tokio::time::timeout(self.grace, async {
                while builds.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                ui::warning(&format!(
                    "Aborting {} build(s) still running after {:?}",
                    self.builds.len(),
                    self.grace
                ));
                self.builds.shutdown().await;
            }
        }

        self.server.stop().await;
        close_reload(self.reload.as_ref()).await;

        self.phase.set(Phase::Stopped);
    }
}

async fn run_task(name: String, build: Option<BuildTask>, lock: Option<Arc<Mutex<()>>>) -> TaskOutcome {
    let Some(build) = build else {
        return Ok(None);
    };

    let _guard = match lock {
        Some(lock) => Some(lock.lock_owned().await),
        None => None,
    };

    tokio::task::spawn_blocking(move || build.run())
        .await
        .map_err(|e| TransformError::new(name, "run", e))?
        .map(Some)
}

async fn close_reload(reload: Option<&LiveReloadChannel>) {
    if let Some(reload) = reload {
        reload.close().await;
    }
}

fn report_built(report: &BuildReport) {
    if report.is_skipped() {
        ui::warning(&format!("{}: no input files matched, nothing built", report.task));
        return;
    }
    ui::success(&format!(
        "Built {} → {} ({}, {})",
        report.task,
        report.output.display(),
        ui::format_size(report.bytes as u64),
        ui::format_duration(report.duration)
    ));
}
