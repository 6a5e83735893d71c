//! Lifecycle state shared between the orchestrator and its handle.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Orchestrator lifecycle: `Stopped -> Starting -> Running -> Stopping -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Stopped => "stopped",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Current phase plus a feed of transitions.
#[derive(Debug, Clone)]
pub struct PhaseState {
    current: Arc<RwLock<Phase>>,
    changes: broadcast::Sender<Phase>,
}

impl PhaseState {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            current: Arc::new(RwLock::new(Phase::Stopped)),
            changes,
        }
    }

    pub fn get(&self) -> Phase {
        *self.current.read()
    }

    pub(crate) fn set(&self, phase: Phase) {
        let previous = std::mem::replace(&mut *self.current.write(), phase);
        if previous != phase {
            tracing::debug!(from = %previous, to = %phase, "dev server phase");
            let _ = self.changes.send(phase);
        }
    }

    /// Transitions from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<Phase> {
        self.changes.subscribe()
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}
