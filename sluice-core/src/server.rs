//! Interface to the development HTTP server.
//!
//! The core never speaks HTTP itself. A [`DevServer`] implementation is
//! handed to the [`BuildContext`](crate::BuildContext) by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::Result;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

/// What to serve and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServeSpec {
    /// Directory to serve, relative to the project root.
    pub root: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port of the live-reload endpoint; `None` disables live reload.
    #[serde(default)]
    pub livereload: Option<u16>,
}

impl Default for ServeSpec {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: default_host(),
            port: default_port(),
            livereload: None,
        }
    }
}

impl ServeSpec {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_livereload(mut self, port: Option<u16>) -> Self {
        self.livereload = port;
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Same spec with `root` resolved against the project root.
    pub fn resolved(&self, project_root: &Path) -> Self {
        Self {
            root: project_root.join(&self.root),
            ..self.clone()
        }
    }
}

/// A running server. Dropping the handle leaves the server running; call
/// [`ServerHandle::shutdown`] to stop it.
#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub livereload_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn new(
        addr: SocketAddr,
        livereload_addr: Option<SocketAddr>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            addr,
            livereload_addr,
            tasks,
        }
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Serves a directory over HTTP and pushes reload notifications.
#[async_trait]
pub trait DevServer: Send + Sync {
    /// Binds and starts serving; returns once the listener is ready.
    async fn serve(&self, spec: &ServeSpec) -> Result<ServerHandle>;

    /// Tells connected browsers to refresh.
    fn reload(&self, changed: &[PathBuf]);
}
