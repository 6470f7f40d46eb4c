//! TOML configuration parsing for task definitions.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::action::{
    Action, CleanAction, CommandAction, InjectAction, NoopAction, PipelineAction, ReloadAction,
    ServeAction, UseminAction, WatchAction,
};
use crate::error::{Error, Result};
use crate::graph::{Task, TaskGraph};
use crate::inject::{InjectSpec, Injector};
use crate::pipeline::{Pipeline, PipelineSpec};
use crate::server::ServeSpec;
use crate::usemin::{Usemin, UseminSpec};
use crate::watcher::WatchSpec;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "sluice.toml";

fn default_debounce_ms() -> u64 {
    300
}

/// Session-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Quiet period before a batch of file changes is dispatched.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// A task as written under `[tasks]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskValue {
    /// `name = ["a", "b"]`: a task that only runs its prerequisites.
    Alias(Vec<String>),
    Full(TaskConfig),
}

impl TaskValue {
    pub fn depends_on(&self) -> &[String] {
        match self {
            TaskValue::Alias(deps) => deps,
            TaskValue::Full(config) => &config.depends_on,
        }
    }
}

/// A task table. At most one action key may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub clean: Option<Vec<String>>,
    #[serde(default)]
    pub pipeline: Option<PipelineSpec>,
    #[serde(default)]
    pub inject: Option<InjectSpec>,
    #[serde(default)]
    pub usemin: Option<UseminSpec>,
    #[serde(default)]
    pub serve: Option<ServeSpec>,
    #[serde(default)]
    pub watch: Option<WatchSpec>,
    #[serde(default)]
    pub reload: bool,
    #[serde(default)]
    pub run: Option<String>,
}

impl TaskConfig {
    fn action_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.clean.is_some() {
            keys.push("clean");
        }
        if self.pipeline.is_some() {
            keys.push("pipeline");
        }
        if self.inject.is_some() {
            keys.push("inject");
        }
        if self.usemin.is_some() {
            keys.push("usemin");
        }
        if self.serve.is_some() {
            keys.push("serve");
        }
        if self.watch.is_some() {
            keys.push("watch");
        }
        if self.reload {
            keys.push("reload");
        }
        if self.run.is_some() {
            keys.push("run");
        }
        keys
    }

    /// Instantiates the action. `root` is the directory paths resolve against.
    pub fn to_action(&self, name: &str, root: &Path) -> Result<Box<dyn Action>> {
        let keys = self.action_keys();
        if keys.len() > 1 {
            return Err(Error::Config(format!(
                "Task '{}' declares more than one action ({}); split it into separate tasks",
                name,
                keys.join(", ")
            )));
        }

        let action: Box<dyn Action> = if let Some(patterns) = &self.clean {
            Box::new(CleanAction::new(patterns.clone()))
        } else if let Some(spec) = &self.pipeline {
            Box::new(PipelineAction(Pipeline::from_spec(spec, root)?))
        } else if let Some(spec) = &self.inject {
            Box::new(InjectAction(Injector::new(spec.clone())?))
        } else if let Some(spec) = &self.usemin {
            Box::new(UseminAction(Usemin::from_spec(spec, root)?))
        } else if let Some(spec) = &self.serve {
            Box::new(ServeAction(spec.clone()))
        } else if let Some(spec) = &self.watch {
            Box::new(WatchAction::new(spec.clone())?)
        } else if self.reload {
            Box::new(ReloadAction)
        } else if let Some(command) = &self.run {
            Box::new(CommandAction::new(command.clone())?)
        } else {
            Box::new(NoopAction)
        };
        Ok(action)
    }
}

/// Project configuration as defined in `sluice.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, deserialize_with = "deserialize_tasks")]
    pub tasks: IndexMap<String, TaskValue>,
    /// Path of the file this configuration was loaded from.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Parses `[tasks]` entry by entry so errors name the offending task.
pub(crate) fn deserialize_tasks<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, TaskValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: IndexMap<String, toml::Value> = IndexMap::deserialize(deserializer)?;
    let mut result = IndexMap::with_capacity(map.len());

    for (name, value) in map {
        let task = match value {
            toml::Value::Array(items) => {
                let deps = items
                    .into_iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Ok(s),
                        other => Err(serde::de::Error::custom(format!(
                            "Task '{}': prerequisites must be strings, found {}",
                            name,
                            other.type_str()
                        ))),
                    })
                    .collect::<std::result::Result<Vec<_>, D::Error>>()?;
                TaskValue::Alias(deps)
            }
            toml::Value::Table(table) => {
                let config: TaskConfig = toml::Value::Table(table).try_into().map_err(|e| {
                    serde::de::Error::custom(format!("Task '{}': {}", name, e))
                })?;
                TaskValue::Full(config)
            }
            other => {
                return Err(serde::de::Error::custom(format!(
                    "Task '{}' must be a list of prerequisites or a table, found {}",
                    name,
                    other.type_str()
                )));
            }
        };
        result.insert(name, task);
    }

    Ok(result)
}

impl BuildConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigNotFound`] when the file does not exist and
    /// [`Error::Toml`] (naming the file) when it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(Error::io_at(path, e)),
        };

        let mut config: BuildConfig = toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Directory that relative paths in the configuration resolve against.
    pub fn root(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Builds the task graph. Prerequisites are not checked here; call
    /// [`TaskGraph::validate`] for an eager check.
    pub fn to_graph(&self) -> Result<TaskGraph> {
        self.to_graph_at(&self.root())
    }

    pub fn to_graph_at(&self, root: &Path) -> Result<TaskGraph> {
        let mut graph = TaskGraph::new();
        for (name, value) in &self.tasks {
            let task = match value {
                TaskValue::Alias(deps) => {
                    Task::new(name, deps.clone(), std::sync::Arc::new(NoopAction))
                }
                TaskValue::Full(config) => {
                    let action = config.to_action(name, root)?;
                    let task = Task::new(name, config.depends_on.clone(), action.into());
                    match &config.description {
                        Some(description) => task.with_description(description),
                        None => task,
                    }
                }
            };
            graph.insert(task)?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_actions_rejected() {
        let config = TaskConfig {
            reload: true,
            run: Some("echo hi".to_string()),
            ..TaskConfig::default()
        };
        let err = config.to_action("both", Path::new(".")).err().expect("expected an error");
        assert!(err.to_string().contains("reload, run"));
    }

    #[test]
    fn test_task_without_action_is_a_group() {
        let action = TaskConfig::default().to_action("group", Path::new(".")).unwrap();
        assert_eq!(action.kind(), "group");
    }

    #[test]
    fn test_root_defaults_to_current_dir() {
        let config = BuildConfig {
            config_path: Some(PathBuf::from("sluice.toml")),
            ..BuildConfig::default()
        };
        assert_eq!(config.root(), PathBuf::from("."));
    }
}
