//! Task execution engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::graph::TaskGraph;

/// Progress notifications emitted while a plan executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// The plan for this invocation is known.
    Planned { tasks: Vec<String> },
    Started { task: String },
    Finished { task: String, duration: Duration },
    Failed { task: String, message: String },
}

pub type TaskObserver = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

/// Runs tasks of a [`TaskGraph`] against a [`BuildContext`].
///
/// Each invocation plans its targets, then runs the plan strictly in order:
/// a task starts only after every task before it completed, and the first
/// failure stops the invocation.
pub struct TaskRunner {
    graph: Arc<TaskGraph>,
    context: Arc<BuildContext>,
    observer: Option<TaskObserver>,
}

impl TaskRunner {
    pub fn new(graph: Arc<TaskGraph>, context: Arc<BuildContext>) -> Self {
        Self {
            graph,
            context,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: TaskObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn context(&self) -> &Arc<BuildContext> {
        &self.context
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Runs `targets` and their prerequisites, each at most once.
    ///
    /// # Errors
    ///
    /// Planning errors are returned as is; a failing action is wrapped in
    /// [`Error::TaskFailed`] naming the task. Nothing after the failing task
    /// runs.
    pub async fn run<S: AsRef<str>>(&self, targets: &[S]) -> Result<RunReport> {
        let plan = self.graph.plan(targets)?;
        debug!(plan = ?plan, "Planned task run");
        self.emit(TaskEvent::Planned {
            tasks: plan.clone(),
        });

        let started = Instant::now();
        let mut results = Vec::with_capacity(plan.len());

        for name in plan {
            let task = self
                .graph
                .get(&name)
                .ok_or_else(|| Error::UnknownTask {
                    name: name.clone(),
                    required_by: None,
                    available: self.graph.names().join(", "),
                })?;
            let kind = task.action().kind();

            info!(task = %name, kind, "Starting");
            self.emit(TaskEvent::Started { task: name.clone() });
            let task_start = Instant::now();

            match task.action().run(&self.context).await {
                Ok(()) => {
                    let duration = task_start.elapsed();
                    info!(task = %name, elapsed_ms = duration.as_millis() as u64, "Finished");
                    self.emit(TaskEvent::Finished {
                        task: name.clone(),
                        duration,
                    });
                    results.push(TaskResult {
                        task_name: name,
                        kind,
                        duration,
                    });
                }
                Err(e) => {
                    error!(task = %name, error = %e, "Task failed");
                    self.emit(TaskEvent::Failed {
                        task: name.clone(),
                        message: e.to_string(),
                    });
                    return Err(Error::TaskFailed {
                        task: name,
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(RunReport {
            results,
            duration: started.elapsed(),
        })
    }
}

/// Result of executing one task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Name of the task that was executed.
    pub task_name: String,
    /// Action kind, as reported by [`Action::kind`](crate::Action::kind).
    pub kind: &'static str,
    pub duration: Duration,
}

/// Results of one invocation, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<TaskResult>,
    pub duration: Duration,
}

impl RunReport {
    pub fn task_names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.task_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{FnAction, NoopAction};
    use std::sync::Mutex;

    fn recording(
        log: &Arc<Mutex<Vec<String>>>,
        name: &'static str,
    ) -> FnAction<impl Fn(&BuildContext) -> Result<()> + Send + Sync> {
        let log = Arc::clone(log);
        FnAction::new(move |_ctx: &BuildContext| {
            log.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_prerequisites_run_first_and_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = TaskGraph::new();
        graph.register("clean", Vec::<String>::new(), recording(&log, "clean")).unwrap();
        graph.register("css", ["clean"], recording(&log, "css")).unwrap();
        graph.register("js", ["clean"], recording(&log, "js")).unwrap();
        graph.register("dist", ["css", "js"], NoopAction).unwrap();

        let runner = TaskRunner::new(Arc::new(graph), Arc::new(BuildContext::new(".")));
        let report = runner.run(&["dist"]).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["clean", "css", "js"]);
        assert_eq!(report.task_names(), vec!["clean", "css", "js", "dist"]);
        assert_eq!(report.results[3].kind, "group");
    }

    #[tokio::test]
    async fn test_failure_stops_the_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = TaskGraph::new();
        graph
            .register(
                "broken",
                Vec::<String>::new(),
                FnAction::new(|_ctx: &BuildContext| Err(Error::Config("boom".to_string()))),
            )
            .unwrap();
        graph.register("after", ["broken"], recording(&log, "after")).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let runner = TaskRunner::new(Arc::new(graph), Arc::new(BuildContext::new(".")))
            .with_observer(Arc::new(move |event: &TaskEvent| {
                sink.lock().unwrap().push(event.clone());
            }));

        let err = runner.run(&["after"]).await.unwrap_err();
        assert!(matches!(err, Error::TaskFailed { ref task, .. } if task == "broken"));
        assert!(log.lock().unwrap().is_empty());
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(TaskEvent::Failed { task, .. }) if task == "broken"
        ));
    }

    #[tokio::test]
    async fn test_unknown_target_runs_nothing() {
        let runner = TaskRunner::new(Arc::new(TaskGraph::new()), Arc::new(BuildContext::new(".")));
        let err = runner.run(&["missing"]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTask { .. }));
    }
}
