//! The long-lived loop behind `watch` tasks: turns file-change batches into
//! task runs.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::context::WatchSubscription;
use crate::error::Result;
use crate::runner::TaskRunner;
use crate::watcher::{FileWatcher, WatcherConfig};

/// Tasks triggered by a batch of changed root-relative paths, in
/// subscription order, each named once.
pub fn tasks_for(subscriptions: &[WatchSubscription], changed: &[PathBuf]) -> Vec<String> {
    let mut tasks: Vec<String> = Vec::new();
    for subscription in subscriptions {
        if changed.iter().any(|path| subscription.files.matches(path)) {
            for task in &subscription.tasks {
                if !tasks.contains(task) {
                    tasks.push(task.clone());
                }
            }
        }
    }
    tasks
}

/// Consumes watch subscriptions and scheduled runs recorded in the
/// [`BuildContext`](crate::BuildContext) of a runner.
///
/// Failures of triggered runs are logged and the loop keeps going; only the
/// shutdown future or a broken watcher ends it.
pub struct Dispatcher {
    runner: Arc<TaskRunner>,
    debounce_ms: u64,
}

impl Dispatcher {
    pub fn new(runner: Arc<TaskRunner>, debounce_ms: u64) -> Self {
        Self {
            runner,
            debounce_ms,
        }
    }

    async fn run_tasks(&self, tasks: &[String]) {
        match self.runner.run(tasks).await {
            Ok(report) => info!(
                tasks = ?tasks,
                ran = report.results.len(),
                elapsed_ms = report.duration.as_millis() as u64,
                "Rebuild finished"
            ),
            Err(e) => error!(tasks = ?tasks, error = %e, "Rebuild failed"),
        }
    }

    /// Runs every scheduled request, including requests scheduled by the
    /// runs themselves.
    pub async fn drain_scheduled(&self) -> Result<()> {
        loop {
            let batches = self.runner.context().take_scheduled()?;
            if batches.is_empty() {
                return Ok(());
            }
            for tasks in batches {
                self.run_tasks(&tasks).await;
            }
        }
    }

    /// Dispatches until `shutdown` resolves, then stops running services.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ctx = Arc::clone(self.runner.context());
        let outcome = self.dispatch(shutdown).await;
        ctx.shutdown_services()?;
        outcome
    }

    async fn dispatch<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let ctx = self.runner.context();

        let mut watcher = if ctx.subscriptions()?.is_empty() {
            None
        } else {
            Some(FileWatcher::new(WatcherConfig {
                debounce_ms: self.debounce_ms,
                root: ctx.root().to_path_buf(),
            })?)
        };

        self.drain_scheduled().await?;

        if let Some(w) = &watcher {
            info!(root = %w.root().display(), "Watching for changes");
        }

        loop {
            let Some(active) = watcher.as_mut() else {
                (&mut shutdown).await;
                return Ok(());
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
                batch = active.next_batch() => {
                    let changed = match batch {
                        Ok(changed) => changed,
                        Err(e) => {
                            warn!(error = %e, "Watcher reported an error");
                            continue;
                        }
                    };
                    if changed.is_empty() {
                        continue;
                    }
                    let tasks = tasks_for(&ctx.subscriptions()?, &changed);
                    debug!(changed = ?changed, tasks = ?tasks, "Change batch");
                    if !tasks.is_empty() {
                        info!(files = changed.len(), tasks = ?tasks, "Change detected");
                        self.run_tasks(&tasks).await;
                    }
                    self.drain_scheduled().await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::FileSet;

    fn sub(patterns: &[&str], tasks: &[&str]) -> WatchSubscription {
        WatchSubscription::new(
            FileSet::new(patterns).unwrap(),
            tasks.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn test_tasks_for_matching_subscriptions() {
        let subs = vec![
            sub(&["src/**/*.*"], &["build-reload"]),
            sub(&["app/*.html"], &["reload", "build-reload"]),
        ];

        assert_eq!(
            tasks_for(&subs, &[PathBuf::from("src/a/b.es6")]),
            vec!["build-reload"]
        );
        assert_eq!(
            tasks_for(&subs, &[PathBuf::from("app/index.html"), PathBuf::from("src/x.es6")]),
            vec!["build-reload", "reload"]
        );
        assert!(tasks_for(&subs, &[PathBuf::from("README.md")]).is_empty());
    }
}
