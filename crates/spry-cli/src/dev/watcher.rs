//! File system watcher with per-path trailing-edge debouncing.
//!
//! Watches the project directory recursively and reports changes to files
//! matching the configured watch rules. Hidden files and task outputs are never
//! reported.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use spry_config::WatchRule;
use spry_pipeline::{GlobMatcher, expand_inputs};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Watcher failures. Any of these stops the dev server.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("watch root was removed: {}", .0.display())]
    RootRemoved(PathBuf),

    #[error("invalid watch glob: {0}")]
    Pattern(#[from] ignore::Error),

    #[error(transparent)]
    Backend(#[from] notify::Error),
}

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Kind reported for a burst that was `self` and then saw `next`.
    fn coalesce(self, next: ChangeKind) -> ChangeKind {
        match (self, next) {
            (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
            (_, next) => next,
        }
    }
}

/// A debounced change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

/// Compiled watch rules: which tasks a path triggers.
#[derive(Debug, Clone)]
pub struct RuleSet {
    root: PathBuf,
    rules: Vec<WatchRule>,
    matchers: Vec<(String, GlobMatcher)>,
}

impl RuleSet {
    pub fn new(root: &Path, rules: Vec<WatchRule>) -> Result<Self, WatchError> {
        let mut by_task: Vec<(String, Vec<String>)> = Vec::new();
        for rule in &rules {
            match by_task.iter_mut().find(|(task, _)| *task == rule.task) {
                Some((_, globs)) => globs.push(rule.glob.clone()),
                None => by_task.push((rule.task.clone(), vec![rule.glob.clone()])),
            }
        }

        let matchers = by_task
            .into_iter()
            .map(|(task, globs)| Ok((task, GlobMatcher::new(root, &globs)?)))
            .collect::<Result<Vec<_>, WatchError>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            rules,
            matchers,
        })
    }

    /// Tasks triggered by a change to `path`, each once, in rule order.
    pub fn tasks_for(&self, path: &Path) -> Vec<&str> {
        self.matchers
            .iter()
            .filter(|(_, matcher)| matcher.is_match(path))
            .map(|(task, _)| task.as_str())
            .collect()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.matchers.iter().any(|(_, matcher)| matcher.is_match(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }
}

/// Watcher tuning.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Paths never reported, typically build outputs
    pub ignore: Vec<PathBuf>,
}

type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// File watcher with debouncing and filtering.
///
/// Must be created inside a tokio runtime; the debounce timer runs as a task.
pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
    debouncer: JoinHandle<()>,
    callbacks: Arc<RwLock<Vec<ChangeCallback>>>,
    errors: Option<mpsc::UnboundedReceiver<WatchError>>,
    rules: RuleSet,
}

#[derive(Debug)]
struct RawChange {
    path: PathBuf,
    kind: ChangeKind,
}

impl FileWatcher {
    /// Start watching `root` for changes matching `rules`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing, a glob is invalid, or the
    /// platform watcher can't be created.
    pub fn watch(root: &Path, rules: Vec<WatchRule>, options: WatchOptions) -> Result<Self, WatchError> {
        let root = root
            .canonicalize()
            .map_err(|_| WatchError::MissingRoot(root.to_path_buf()))?;
        let rules = RuleSet::new(&root, rules)?;

        for rule in rules.rules() {
            if expand_inputs(&root, std::slice::from_ref(&rule.glob))?.is_empty() {
                tracing::warn!(glob = %rule.glob, task = %rule.task, "watch glob matches no files");
            }
        }

        let ignored: HashSet<PathBuf> = options
            .ignore
            .iter()
            .map(|path| canonical_or_normal(path, &root))
            .collect();

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let filter_root = root.clone();
        let filter_rules = rules.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if removes(&event, &filter_root) {
                    let _ = error_tx.send(WatchError::RootRemoved(filter_root.clone()));
                    return;
                }
                for (path, kind) in classify(&event) {
                    if should_ignore(&path, &filter_root, &ignored) || !filter_rules.matches(&path) {
                        continue;
                    }
                    let _ = raw_tx.send(RawChange { path, kind });
                }
            }
            Err(e) => {
                let _ = error_tx.send(WatchError::Backend(e));
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let callbacks: Arc<RwLock<Vec<ChangeCallback>>> = Arc::default();
        let debouncer = tokio::spawn(debounce(raw_rx, options.debounce, callbacks.clone()));

        tracing::debug!(root = %root.display(), rules = rules.rules().len(), "watching");

        Ok(Self {
            watcher: Some(watcher),
            debouncer,
            callbacks,
            errors: Some(error_rx),
            rules,
        })
    }

    /// Register a consumer, invoked once per debounced change.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Take the stream of backend failures. Returns `None` after the first call.
    pub fn errors(&mut self) -> Option<mpsc::UnboundedReceiver<WatchError>> {
        self.errors.take()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Stop watching. Pending, not yet debounced changes are dropped.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            self.debouncer.abort();
            tracing::debug!("file watcher stopped");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a notify event to (path, kind) pairs. Access and other events yield nothing.
fn classify(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths are [from, to]
            return event
                .paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let kind = if i == 0 { ChangeKind::Deleted } else { ChangeKind::Created };
                    (path.clone(), kind)
                })
                .collect();
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|path| kind == ChangeKind::Deleted || !path.is_dir())
        .map(|path| (path.clone(), kind))
        .collect()
}

/// True when the event deletes or moves away the watched root itself.
fn removes(event: &Event, root: &Path) -> bool {
    let gone = matches!(
        event.kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From))
    );
    gone && event.paths.iter().any(|path| path == root)
}

/// Check if a path should be ignored: outside root, hidden, or a task output.
fn should_ignore(path: &Path, root: &Path, ignored: &HashSet<PathBuf>) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };

    let hidden = relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    });

    hidden || ignored.contains(path)
}

fn canonical_or_normal(path: &Path, root: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    if let Ok(canonical) = absolute.canonicalize() {
        return canonical;
    }
    // Outputs may not exist yet; canonicalize the parent instead.
    match (absolute.parent().and_then(|dir| dir.canonicalize().ok()), absolute.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => super::config::normalize(&absolute),
    }
}

#[derive(Debug)]
struct Pending {
    kind: ChangeKind,
    deadline: Instant,
}

async fn debounce(
    mut raw_rx: mpsc::UnboundedReceiver<RawChange>,
    window: Duration,
    callbacks: Arc<RwLock<Vec<ChangeCallback>>>,
) {
    let mut pending: HashMap<PathBuf, Pending> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|entry| entry.deadline).min();

        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                let deadline = Instant::now() + window;
                pending
                    .entry(raw.path)
                    .and_modify(|entry| {
                        entry.kind = entry.kind.coalesce(raw.kind);
                        entry.deadline = deadline;
                    })
                    .or_insert(Pending { kind: raw.kind, deadline });
            }
            _ = sleep_until(next_deadline) => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, entry)| entry.deadline <= now)
                    .map(|(path, _)| path.clone())
                    .collect();

                for path in due {
                    if let Some(entry) = pending.remove(&path) {
                        let event = ChangeEvent {
                            path,
                            kind: entry.kind,
                            timestamp: Utc::now(),
                        };
                        tracing::debug!(path = %event.path.display(), kind = ?event.kind, "change");
                        let consumers = callbacks.read().clone();
                        for consumer in consumers {
                            consumer(&event);
                        }
                    }
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(glob: &str, task: &str) -> WatchRule {
        WatchRule {
            glob: glob.into(),
            task: task.into(),
        }
    }

    #[test]
    fn created_then_modified_stays_created() {
        assert_eq!(ChangeKind::Created.coalesce(ChangeKind::Modified), ChangeKind::Created);
        assert_eq!(ChangeKind::Modified.coalesce(ChangeKind::Deleted), ChangeKind::Deleted);
        assert_eq!(ChangeKind::Created.coalesce(ChangeKind::Deleted), ChangeKind::Deleted);
        assert_eq!(ChangeKind::Deleted.coalesce(ChangeKind::Created), ChangeKind::Created);
    }

    #[test]
    fn rules_group_by_task() {
        let rules = RuleSet::new(
            Path::new("/project"),
            vec![
                rule("app/styles/*.css", "styles"),
                rule("app/**/*.html", "html"),
                rule("app/*.css", "styles"),
                rule("app/**/*", "everything"),
            ],
        )
        .unwrap();

        assert_eq!(
            rules.tasks_for(Path::new("/project/app/styles/a.css")),
            ["styles", "everything"]
        );
        assert_eq!(rules.tasks_for(Path::new("/project/app/index.html")), ["html", "everything"]);
        assert!(!rules.matches(Path::new("/project/README.md")));
    }

    #[test]
    fn should_ignore_hidden_files() {
        let root = PathBuf::from("/project");
        let ignored = HashSet::new();

        assert!(should_ignore(Path::new("/project/.git/config"), &root, &ignored));
        assert!(should_ignore(Path::new("/project/app/.styles.css.swp"), &root, &ignored));
        assert!(!should_ignore(Path::new("/project/app/styles.css"), &root, &ignored));
    }

    #[test]
    fn should_ignore_outputs_and_outside_root() {
        let root = PathBuf::from("/project");
        let ignored: HashSet<PathBuf> = [PathBuf::from("/project/app/dist/styles.css")].into();

        assert!(should_ignore(Path::new("/project/app/dist/styles.css"), &root, &ignored));
        assert!(should_ignore(Path::new("/other/file.css"), &root, &ignored));
    }

    #[test]
    fn removing_the_root_is_detected() {
        let root = Path::new("/project");
        let gone = Event::new(EventKind::Remove(notify::event::RemoveKind::Folder)).add_path(root.to_path_buf());
        let child = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/project/app/a.css"));

        assert!(removes(&gone, root));
        assert!(!removes(&child, root));
    }

    #[test]
    fn rename_both_splits_into_delete_and_create() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/project/a.css"))
            .add_path(PathBuf::from("/project/b.css"));

        assert_eq!(
            classify(&event),
            [
                (PathBuf::from("/project/a.css"), ChangeKind::Deleted),
                (PathBuf::from("/project/b.css"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn access_events_are_dropped() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(PathBuf::from("/p/a.css"));
        assert!(classify(&event).is_empty());
    }
}
