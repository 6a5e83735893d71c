//! Live reload over Server-Sent Events.
//!
//! Browsers load `/__spry/livereload.js`, which opens an `EventSource` on
//! `/__spry/livereload`. Each open stream is a [`ReloadSession`]; a
//! notification is a JSON line `{"event":"reload","scope":...,"path":...}`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::server::ServerHandle;
use crate::error::Result;

/// SSE endpoint
pub const EVENTS_PATH: &str = "/__spry/livereload";
/// Client script endpoint
pub const SCRIPT_PATH: &str = "/__spry/livereload.js";

const CLIENT_SCRIPT: &str = include_str!("../../assets/livereload-client.js");

/// Per-session buffer. A session this far behind is dropped.
const SESSION_BUFFER: usize = 64;

/// How much of the page to reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadScope {
    Full,
    Asset,
}

/// A reload notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reload {
    pub event: String,
    pub scope: ReloadScope,
    /// URL path of the changed asset
    pub path: Option<String>,
}

impl Reload {
    pub fn full() -> Self {
        Self {
            event: "reload".into(),
            scope: ReloadScope::Full,
            path: None,
        }
    }

    pub fn asset(path: impl Into<String>) -> Self {
        Self {
            event: "reload".into(),
            scope: ReloadScope::Asset,
            path: Some(path.into()),
        }
    }
}

/// A connected browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSession {
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
}

struct Session {
    info: ReloadSession,
    tx: mpsc::Sender<Arc<str>>,
}

#[derive(Default)]
struct Inner {
    sessions: RwLock<HashMap<Uuid, Session>>,
    closed: AtomicBool,
    listener: Mutex<Option<ServerHandle>>,
}

/// Registry of connected sessions and the broadcaster for reload notifications.
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone, Default)]
pub struct LiveReloadChannel {
    inner: Arc<Inner>,
}

impl LiveReloadChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes for mounting on a shared server.
    pub fn router(&self) -> Router {
        Router::new()
            .route(EVENTS_PATH, get(handle_events))
            .route(SCRIPT_PATH, get(handle_script))
            .with_state(self.clone())
    }

    /// Serve the reload endpoints on their own port.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Bind` if the address is unavailable.
    pub async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let handle = ServerHandle::serve(addr, self.router()).await?;
        let local = handle.local_addr();
        tracing::debug!(addr = %local, "live reload listening");
        *self.inner.listener.lock() = Some(handle);
        Ok(local)
    }

    /// Register a new session.
    ///
    /// Returns `None` once the channel is closed.
    pub fn connect(&self) -> Option<(ReloadSession, mpsc::Receiver<Arc<str>>)> {
        if self.inner.closed.load(Ordering::Acquire) {
            return None;
        }

        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let info = ReloadSession {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
        };
        self.inner.sessions.write().insert(
            info.id,
            Session {
                info: info.clone(),
                tx,
            },
        );
        tracing::debug!(session = %info.id, "live reload client connected");
        Some((info, rx))
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn disconnect(&self, id: Uuid) {
        if self.inner.sessions.write().remove(&id).is_some() {
            tracing::debug!(session = %id, "live reload client disconnected");
        }
    }

    /// Send a notification to every session without waiting.
    ///
    /// Sessions that are gone or not keeping up are dropped. Returns the number
    /// of sessions the notification was queued for.
    pub fn broadcast(&self, reload: &Reload) -> usize {
        let message: Arc<str> = match serde_json::to_string(reload) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode reload notification");
                return 0;
            }
        };

        let mut failed = Vec::new();
        let mut delivered = 0;
        {
            let sessions = self.inner.sessions.read();
            for (id, session) in sessions.iter() {
                match session.tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(session = %id, "live reload client is not keeping up, dropping it");
                        failed.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => failed.push(*id),
                }
            }
        }

        for id in failed {
            self.disconnect(id);
        }

        tracing::debug!(scope = ?reload.scope, path = ?reload.path, clients = delivered, "reload broadcast");
        delivered
    }

    /// Snapshot of connected sessions.
    pub fn sessions(&self) -> Vec<ReloadSession> {
        self.inner.sessions.read().values().map(|session| session.info.clone()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Drop every session and stop the dedicated listener, if any. Idempotent.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.sessions.write().clear();

        let listener = self.inner.listener.lock().take();
        if let Some(mut listener) = listener {
            listener.stop().await;
        }
    }
}

/// Unregisters its session when the SSE stream is dropped.
struct SessionGuard {
    channel: LiveReloadChannel,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.channel.disconnect(self.id);
    }
}

async fn handle_events(State(channel): State<LiveReloadChannel>) -> Response {
    let Some((session, mut rx)) = channel.connect() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let guard = SessionGuard {
        channel: channel.clone(),
        id: session.id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(message) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().data(&*message));
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
        .into_response()
}

async fn handle_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_shape() {
        assert_eq!(
            serde_json::to_string(&Reload::full()).unwrap(),
            r#"{"event":"reload","scope":"full","path":null}"#
        );
        assert_eq!(
            serde_json::to_string(&Reload::asset("/dist/styles.css")).unwrap(),
            r#"{"event":"reload","scope":"asset","path":"/dist/styles.css"}"#
        );
    }

    #[tokio::test]
    async fn broadcast_reaches_sessions_in_order() {
        let channel = LiveReloadChannel::new();
        let (_, mut first) = channel.connect().unwrap();
        let (_, mut second) = channel.connect().unwrap();

        assert_eq!(channel.broadcast(&Reload::asset("/a.css")), 2);
        assert_eq!(channel.broadcast(&Reload::full()), 2);

        for rx in [&mut first, &mut second] {
            assert!(rx.recv().await.unwrap().contains("/a.css"));
            assert!(rx.recv().await.unwrap().contains("\"full\""));
        }
    }

    #[tokio::test]
    async fn dead_session_is_dropped_without_affecting_others() {
        let channel = LiveReloadChannel::new();
        let (_, dead) = channel.connect().unwrap();
        let (_, mut alive) = channel.connect().unwrap();
        drop(dead);

        assert_eq!(channel.broadcast(&Reload::full()), 1);
        assert_eq!(channel.session_count(), 1);
        assert!(alive.recv().await.is_some());
    }

    #[tokio::test]
    async fn slow_session_is_dropped() {
        let channel = LiveReloadChannel::new();
        let (_, _stalled) = channel.connect().unwrap();

        for _ in 0..SESSION_BUFFER {
            channel.broadcast(&Reload::full());
        }
        assert_eq!(channel.session_count(), 1);

        assert_eq!(channel.broadcast(&Reload::full()), 0);
        assert_eq!(channel.session_count(), 0);
    }

    #[tokio::test]
    async fn close_ends_sessions_and_refuses_new_ones() {
        let channel = LiveReloadChannel::new();
        let (_, mut rx) = channel.connect().unwrap();

        channel.close().await;
        channel.close().await;

        assert!(rx.recv().await.is_none());
        assert!(channel.connect().is_none());
        assert_eq!(channel.broadcast(&Reload::full()), 0);
    }
}
