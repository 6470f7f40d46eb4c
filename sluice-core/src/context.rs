//! State shared by the actions of one build session.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::server::{DevServer, ServerHandle};

/// Triggers `tasks` whenever a file matching `files` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSubscription {
    pub files: FileSet,
    pub tasks: Vec<String>,
}

impl WatchSubscription {
    pub fn new(files: FileSet, tasks: Vec<String>) -> Self {
        Self { files, tasks }
    }
}

/// Everything an action may touch besides the filesystem: the project root,
/// the dev server backend, watch subscriptions, scheduled follow-up runs and
/// running services.
///
/// Actions only record subscriptions and schedule requests here; the
/// [`Dispatcher`](crate::Dispatcher) consumes them.
pub struct BuildContext {
    root: PathBuf,
    dev_server: Option<Arc<dyn DevServer>>,
    subscriptions: Mutex<Vec<WatchSubscription>>,
    scheduled: Mutex<Vec<Vec<String>>>,
    services: Mutex<Vec<ServerHandle>>,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .field("dev_server", &self.dev_server.is_some())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| Error::MutexLock(e.to_string()))
}

impl BuildContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dev_server: None,
            subscriptions: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
            services: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dev_server(mut self, server: Arc<dyn DevServer>) -> Self {
        self.dev_server = Some(server);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn dev_server(&self) -> Option<&Arc<dyn DevServer>> {
        self.dev_server.as_ref()
    }

    /// Records a watch subscription; identical subscriptions are kept once.
    pub fn subscribe(&self, subscription: WatchSubscription) -> Result<()> {
        let mut subscriptions = lock(&self.subscriptions)?;
        if !subscriptions.contains(&subscription) {
            debug!(
                patterns = ?subscription.files.patterns(),
                tasks = ?subscription.tasks,
                "Registered watch subscription"
            );
            subscriptions.push(subscription);
        }
        Ok(())
    }

    pub fn subscriptions(&self) -> Result<Vec<WatchSubscription>> {
        Ok(lock(&self.subscriptions)?.clone())
    }

    /// Asks the dispatcher to run `tasks` once the current run finishes.
    pub fn schedule(&self, tasks: Vec<String>) -> Result<()> {
        if !tasks.is_empty() {
            lock(&self.scheduled)?.push(tasks);
        }
        Ok(())
    }

    pub fn take_scheduled(&self) -> Result<Vec<Vec<String>>> {
        Ok(std::mem::take(&mut *lock(&self.scheduled)?))
    }

    pub fn add_service(&self, handle: ServerHandle) -> Result<()> {
        lock(&self.services)?.push(handle);
        Ok(())
    }

    pub fn service_count(&self) -> usize {
        self.services.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// `true` when the session must stay alive after the requested tasks
    /// finished: servers are running or files are being watched.
    pub fn is_persistent(&self) -> bool {
        let watching = self
            .subscriptions
            .lock()
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        watching || self.service_count() > 0
    }

    pub fn shutdown_services(&self) -> Result<()> {
        for handle in lock(&self.services)?.drain(..) {
            debug!(addr = %handle.addr, "Stopping server");
            handle.shutdown();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriptions_are_deduplicated() {
        let ctx = BuildContext::new(".");
        let sub = WatchSubscription::new(FileSet::new(["src/**/*"]).unwrap(), vec!["build".into()]);
        ctx.subscribe(sub.clone()).unwrap();
        ctx.subscribe(sub).unwrap();
        assert_eq!(ctx.subscriptions().unwrap().len(), 1);
        assert!(ctx.is_persistent());
    }

    #[test]
    fn test_scheduled_runs_are_drained() {
        let ctx = BuildContext::new(".");
        ctx.schedule(vec!["a".into()]).unwrap();
        ctx.schedule(vec![]).unwrap();
        assert_eq!(ctx.take_scheduled().unwrap(), vec![vec!["a".to_string()]]);
        assert!(ctx.take_scheduled().unwrap().is_empty());
        assert!(!ctx.is_persistent());
    }
}
