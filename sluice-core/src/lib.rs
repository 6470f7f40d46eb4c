//! Core library for declarative front-end build orchestration.

pub mod action;
pub mod clean;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fileset;
pub mod graph;
pub mod inject;
pub mod path_utils;
pub mod pipeline;
pub mod runner;
pub mod server;
pub mod sourcemap;
pub mod starter;
pub mod transform;
pub mod usemin;
pub mod watcher;

pub use action::{
    Action, CleanAction, CommandAction, FnAction, InjectAction, NoopAction, PipelineAction,
    ReloadAction, ServeAction, UseminAction, WatchAction,
};
pub use clean::{clean, CleanReport};
pub use config::{BuildConfig, Settings, TaskConfig, TaskValue, CONFIG_FILE};
pub use context::{BuildContext, WatchSubscription};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use fileset::{FileSet, SourceFile};
pub use graph::{Task, TaskGraph};
pub use inject::{InjectReport, InjectSpec, Injector};
pub use path_utils::PathRewrite;
pub use pipeline::{Pipeline, PipelineReport, PipelineSpec};
pub use runner::{RunReport, TaskEvent, TaskObserver, TaskResult, TaskRunner};
pub use server::{DevServer, ServeSpec, ServerHandle};
pub use starter::STARTER_CONFIG;
pub use transform::{Asset, StepConfig, TransformStep};
pub use usemin::{Usemin, UseminReport, UseminSpec};
pub use watcher::{FileWatcher, WatchSpec, WatcherConfig};
