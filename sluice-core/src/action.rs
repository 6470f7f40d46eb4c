//! Task actions.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::clean::clean;
use crate::context::{BuildContext, WatchSubscription};
use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::inject::Injector;
use crate::pipeline::Pipeline;
use crate::server::ServeSpec;
use crate::usemin::Usemin;
use crate::watcher::WatchSpec;

/// The body of a task, run after all of its prerequisites completed.
#[async_trait]
pub trait Action: Send + Sync {
    /// Short label used in listings and logs.
    fn kind(&self) -> &'static str;

    async fn run(&self, ctx: &BuildContext) -> Result<()>;
}

/// Does nothing; used for tasks that only group prerequisites.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    fn kind(&self) -> &'static str {
        "group"
    }

    async fn run(&self, _ctx: &BuildContext) -> Result<()> {
        Ok(())
    }
}

/// Wraps a synchronous closure.
pub struct FnAction<F>(F);

impl<F> FnAction<F>
where
    F: Fn(&BuildContext) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&BuildContext) -> Result<()> + Send + Sync,
{
    fn kind(&self) -> &'static str {
        "custom"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        (self.0)(ctx)
    }
}

#[derive(Debug, Clone)]
pub struct CleanAction {
    patterns: Vec<String>,
}

impl CleanAction {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

#[async_trait]
impl Action for CleanAction {
    fn kind(&self) -> &'static str {
        "clean"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        clean(ctx.root(), &self.patterns).await.map(|_| ())
    }
}

#[derive(Debug)]
pub struct PipelineAction(pub Pipeline);

#[async_trait]
impl Action for PipelineAction {
    fn kind(&self) -> &'static str {
        "pipeline"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        self.0.run(ctx.root()).await.map(|_| ())
    }
}

#[derive(Debug)]
pub struct InjectAction(pub Injector);

#[async_trait]
impl Action for InjectAction {
    fn kind(&self) -> &'static str {
        "inject"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        self.0.run(ctx.root()).await.map(|_| ())
    }
}

#[derive(Debug)]
pub struct UseminAction(pub Usemin);

#[async_trait]
impl Action for UseminAction {
    fn kind(&self) -> &'static str {
        "usemin"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        self.0.run(ctx.root()).await.map(|_| ())
    }
}

/// Starts the dev server and registers it as a session service.
#[derive(Debug, Clone)]
pub struct ServeAction(pub ServeSpec);

#[async_trait]
impl Action for ServeAction {
    fn kind(&self) -> &'static str {
        "serve"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        let server = ctx.dev_server().ok_or_else(|| {
            Error::Server("no dev server backend is configured for this session".to_string())
        })?;
        let spec = self.0.resolved(ctx.root());
        let handle = server.serve(&spec).await?;
        info!(
            root = %self.0.root.display(),
            addr = %handle.addr,
            livereload = ?handle.livereload_addr,
            "Server started"
        );
        ctx.add_service(handle)
    }
}

/// Notifies live-reload clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReloadAction;

#[async_trait]
impl Action for ReloadAction {
    fn kind(&self) -> &'static str {
        "reload"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        match ctx.dev_server() {
            Some(server) => {
                server.reload(&[]);
                info!("Reload notification sent");
            }
            None => warn!("Reload requested but no dev server is running"),
        }
        Ok(())
    }
}

/// Subscribes tasks to file changes, optionally scheduling them right away.
#[derive(Debug, Clone)]
pub struct WatchAction {
    files: FileSet,
    spec: WatchSpec,
}

impl WatchAction {
    pub fn new(spec: WatchSpec) -> Result<Self> {
        if spec.tasks.is_empty() {
            return Err(Error::Config("watch 'tasks' must name at least one task".to_string()));
        }
        Ok(Self {
            files: FileSet::new(&spec.globs)?,
            spec,
        })
    }

    pub fn spec(&self) -> &WatchSpec {
        &self.spec
    }
}

#[async_trait]
impl Action for WatchAction {
    fn kind(&self) -> &'static str {
        "watch"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        ctx.subscribe(WatchSubscription::new(
            self.files.clone(),
            self.spec.tasks.clone(),
        ))?;
        if self.spec.initial {
            ctx.schedule(self.spec.tasks.clone())?;
        }
        Ok(())
    }
}

/// Runs a shell command in the project root.
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: String,
}

impl CommandAction {
    pub fn new(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(Error::Config("Command cannot be empty".to_string()));
        }
        Ok(Self { command })
    }
}

#[async_trait]
impl Action for CommandAction {
    fn kind(&self) -> &'static str {
        "run"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(ctx.root())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Command {
                command: self.command.clone(),
                message: format!("Failed to execute: {}", e),
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!("{}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Command {
                command: self.command.clone(),
                message: if stderr.trim().is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr.trim().to_string()
                },
            })
        }
    }
}
