//! File watching for change-triggered rebuilds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

fn default_initial() -> bool {
    false
}

/// A watch action as written in `sluice.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSpec {
    pub globs: Vec<String>,
    pub tasks: Vec<String>,
    /// Schedule the tasks once as soon as the subscription is registered.
    #[serde(default = "default_initial")]
    pub initial: bool,
}

pub struct WatcherConfig {
    pub debounce_ms: u64,
    pub root: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            root: PathBuf::from("."),
        }
    }
}

/// Debounced recursive watcher over the project root.
///
/// Change batches arrive on a tokio channel; [`FileWatcher::next_batch`]
/// yields root-relative paths, so callers can match them against globs.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: mpsc::UnboundedReceiver<DebounceEventResult>,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let root = std::fs::canonicalize(&config.root).map_err(|e| Error::io_at(&config.root, e))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            Duration::from_millis(config.debounce_ms),
            move |res: DebounceEventResult| {
                let _ = tx.send(res);
            },
        )
        .map_err(|e| Error::Watcher(format!("Failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watcher(format!("Failed to watch {}: {}", root.display(), e)))?;

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Waits for the next debounced batch of changed paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Watcher`] for backend errors (the watcher keeps
    /// running) and when the event channel is closed (it does not).
    pub async fn next_batch(&mut self) -> Result<Vec<PathBuf>> {
        match self.receiver.recv().await {
            Some(Ok(events)) => {
                let mut paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter_map(|event| relative_to(&self.root, &event.path))
                    .collect();
                paths.sort();
                paths.dedup();
                Ok(paths)
            }
            Some(Err(e)) => Err(Error::Watcher(format!("Watcher error: {}", e))),
            None => Err(Error::Watcher("Watcher channel disconnected".to_string())),
        }
    }
}

fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_root() {
        assert_eq!(
            relative_to(Path::new("/p"), Path::new("/p/src/a.es6")),
            Some(PathBuf::from("src/a.es6"))
        );
        assert_eq!(relative_to(Path::new("/p"), Path::new("/p")), None);
        assert_eq!(relative_to(Path::new("/p"), Path::new("/elsewhere/a")), None);
    }

    #[test]
    fn test_watch_spec_defaults() {
        let spec: WatchSpec = toml::from_str(
            r#"
globs = ["src/**/*.*"]
tasks = ["build-reload"]
"#,
        )
        .unwrap();
        assert!(!spec.initial);
        assert_eq!(spec.tasks, vec!["build-reload".to_string()]);
    }
}
