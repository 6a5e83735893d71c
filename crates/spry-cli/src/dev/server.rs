//! Static file server.
//!
//! Serves GET requests from the root directory. Requests that normalize to a
//! path outside the root are answered with 403; directories resolve to their
//! index document and are never listed.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use super::config::ServerConfig;
use super::reload::LiveReloadChannel;
use crate::error::{CliError, Result};

/// How long `stop` waits for open connections before dropping them.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// A running listener.
///
/// The socket is bound by the time a handle exists. [`stop`](Self::stop)
/// releases it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    /// Bind `addr` and serve `app` in the background.
    pub(crate) async fn serve(addr: SocketAddr, app: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CliError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop accepting connections and release the port. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };

        match tokio::time::timeout(STOP_TIMEOUT, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "server exited with an error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "server task failed"),
            Err(_) => {
                tracing::debug!(addr = %self.local_addr, "connections still open, aborting server");
                task.abort();
                let _ = task.await;
            }
        }
    }
}

#[derive(Debug)]
struct ServeState {
    root: PathBuf,
    index: String,
}

/// Serves files from a root directory.
pub struct StaticFileServer;

impl StaticFileServer {
    /// Bind the configured address and start serving.
    ///
    /// When `reload` is given its endpoints are mounted on the same listener.
    ///
    /// # Errors
    ///
    /// - `CliError::Path` if the root directory is missing
    /// - `CliError::Bind` if the address is unavailable
    pub async fn start(config: &ServerConfig, reload: Option<&LiveReloadChannel>) -> Result<ServerHandle> {
        let app = Self::router(config, reload)?;
        let handle = ServerHandle::serve(config.addr, app).await?;
        tracing::debug!(addr = %handle.local_addr(), root = %config.root.display(), "static file server listening");
        Ok(handle)
    }

    /// Build the router without binding.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Path` if the root directory is missing.
    pub fn router(config: &ServerConfig, reload: Option<&LiveReloadChannel>) -> Result<Router> {
        let root = config
            .root
            .canonicalize()
            .ok()
            .filter(|root| root.is_dir())
            .ok_or_else(|| CliError::Path(config.root.clone()))?;

        let state = Arc::new(ServeState {
            root,
            index: config.index().to_string(),
        });

        let mut app = Router::new().fallback(handle_request).with_state(state);
        if let Some(reload) = reload {
            app = app.merge(reload.router());
        }

        Ok(app
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)))
    }
}

/// Why a request path can't be served.
#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    /// Not valid percent-encoded UTF-8
    BadRequest,
    /// Normalizes outside the root
    Forbidden,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::BadRequest => (StatusCode::BAD_REQUEST, "Bad request path").into_response(),
            Rejection::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        }
    }
}

/// Decode and normalize a URL path into root-relative segments.
fn resolve_segments(raw: &str) -> std::result::Result<Vec<String>, Rejection> {
    let decoded = urlencoding::decode(raw).map_err(|_| Rejection::BadRequest)?;
    if decoded.contains('\0') {
        return Err(Rejection::BadRequest);
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Rejection::Forbidden);
                }
            }
            // Drive prefixes would replace the root when joined.
            s if s.contains(':') && cfg!(windows) => return Err(Rejection::Forbidden),
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}

async fn handle_request(State(state): State<Arc<ServeState>>, request: Request) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET, HEAD")]).into_response();
    }

    let segments = match resolve_segments(request.uri().path()) {
        Ok(segments) => segments,
        Err(rejection) => {
            tracing::debug!(path = request.uri().path(), ?rejection, "rejected request");
            return rejection.into_response();
        }
    };

    let mut path = state.root.clone();
    path.extend(&segments);

    let path = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => path.join(&state.index),
        Ok(_) => path,
        Err(_) if segments == ["favicon.ico"] => return StatusCode::NO_CONTENT.into_response(),
        Err(_) => return not_found(request.uri().path()),
    };

    // Symlinks may still point outside the root.
    match tokio::fs::canonicalize(&path).await {
        Ok(real) if !real.starts_with(&state.root) => return Rejection::Forbidden.into_response(),
        Ok(_) => {}
        Err(_) => return not_found(request.uri().path()),
    }

    serve_file(&path, request).await
}

async fn serve_file(path: &Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            parts
                .headers
                .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
            Response::from_parts(parts, Body::new(body))
        }
        Err(never) => match never {},
    }
}

fn not_found(path: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("File not found: {}", path)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_resolve() {
        assert_eq!(resolve_segments("/css/site.css").unwrap(), ["css", "site.css"]);
        assert!(resolve_segments("/").unwrap().is_empty());
    }

    #[test]
    fn dot_segments_normalize_inside_root() {
        assert_eq!(resolve_segments("/a/./b/../c.css").unwrap(), ["a", "c.css"]);
    }

    #[test]
    fn escaping_root_is_forbidden() {
        assert_eq!(resolve_segments("/../etc/passwd"), Err(Rejection::Forbidden));
        assert_eq!(resolve_segments("/a/../../secret"), Err(Rejection::Forbidden));
        assert_eq!(resolve_segments("/%2e%2e/secret"), Err(Rejection::Forbidden));
        assert_eq!(resolve_segments("/a/..%2F..%2Fsecret"), Err(Rejection::Forbidden));
        assert_eq!(resolve_segments("/a\\..\\..\\secret"), Err(Rejection::Forbidden));
    }

    #[test]
    fn invalid_encoding_is_rejected() {
        assert_eq!(resolve_segments("/%ff%fe"), Err(Rejection::BadRequest));
        assert_eq!(resolve_segments("/a%00.css"), Err(Rejection::BadRequest));
    }

    #[test]
    fn percent_encoded_names_decode() {
        assert_eq!(resolve_segments("/web%20fonts.html").unwrap(), ["web fonts.html"]);
    }
}
