//! Static file server with optional live reload.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    Router,
};
use sluice_core::{DevServer, ServeSpec, ServerHandle};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{Result, ServeError};
use crate::livereload::{self, inject_snippet, snippet, LiveReload};

/// Creates the router serving `root`. With a live-reload port, HTML
/// responses get the client snippet injected.
pub fn create_router(root: impl AsRef<Path>, livereload_port: Option<u16>) -> Router {
    let files = ServeDir::new(root.as_ref()).append_index_html_on_directories(true);
    let router = Router::new().fallback_service(files);

    let router = match livereload_port {
        Some(port) => router.layer(middleware::from_fn_with_state(
            Arc::<str>::from(snippet(port)),
            inject_livereload,
        )),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

async fn inject_livereload(
    State(snippet): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false);
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let html = String::from_utf8_lossy(&bytes);
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(inject_snippet(&html, &snippet)))
        }
        Err(e) => {
            warn!(error = %e, "Failed to buffer HTML response for live reload");
            Response::from_parts(parts, Body::empty())
        }
    }
}

async fn bind(addr: &str) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await.map_err(|source| ServeError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}

fn spawn_server(listener: TcpListener, router: Router, label: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(server = label, error = %e, "Server stopped with an error");
        }
    })
}

/// Binds and starts serving `spec.root` (and the live-reload port if set).
/// Returns the handle and, with live reload, the hub to notify.
pub async fn start(spec: &ServeSpec) -> Result<(ServerHandle, Option<LiveReload>)> {
    if !spec.root.is_dir() {
        return Err(ServeError::InvalidRoot(spec.root.clone()));
    }

    // Both listeners are bound before either server is spawned.
    let reload_listener = match spec.livereload {
        Some(port) => Some(bind(&format!("{}:{}", spec.host, port)).await?),
        None => None,
    };
    let (listener, addr) = bind(&spec.bind_addr()).await?;

    let mut tasks = Vec::new();
    let mut hub = None;
    let mut livereload_addr = None;
    if let Some((reload_listener, reload_addr)) = reload_listener {
        let reload = LiveReload::new();
        tasks.push(spawn_server(
            reload_listener,
            livereload::router(reload.clone()),
            "livereload",
        ));
        info!(addr = %reload_addr, "Live reload listening");
        livereload_addr = Some(reload_addr);
        hub = Some(reload);
    }

    let snippet_port = livereload_addr.map(|a| a.port());
    tasks.push(spawn_server(listener, create_router(&spec.root, snippet_port), "static"));
    info!(root = %spec.root.display(), addr = %addr, "Serving files");

    Ok((ServerHandle::new(addr, livereload_addr, tasks), hub))
}

/// [`DevServer`] backed by axum. Reload notifications go to every live-reload
/// hub started through this instance.
#[derive(Debug, Default)]
pub struct AxumDevServer {
    hubs: Mutex<Vec<LiveReload>>,
}

impl AxumDevServer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DevServer for AxumDevServer {
    async fn serve(&self, spec: &ServeSpec) -> sluice_core::Result<ServerHandle> {
        let (handle, hub) = start(spec).await?;
        if let Some(hub) = hub {
            self.hubs
                .lock()
                .map_err(|e| sluice_core::Error::MutexLock(e.to_string()))?
                .push(hub);
        }
        Ok(handle)
    }

    fn reload(&self, changed: &[PathBuf]) {
        match self.hubs.lock() {
            Ok(hubs) => {
                let reached: usize = hubs.iter().map(|hub| hub.notify(changed)).sum();
                info!(clients = reached, "Reloading browsers");
            }
            Err(e) => error!(error = %e, "Live reload hubs unavailable"),
        }
    }
}
