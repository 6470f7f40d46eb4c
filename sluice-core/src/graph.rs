//! Task dependency graph.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::action::Action;
use crate::error::{Error, Result};

/// A named unit of build work with declared prerequisites.
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub depends_on: Vec<String>,
    pub description: Option<String>,
    action: Arc<dyn Action>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("action", &self.action.kind())
            .finish()
    }
}

impl Task {
    pub fn new<I, S>(name: impl Into<String>, depends_on: I, action: Arc<dyn Action>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            description: None,
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn action(&self) -> &Arc<dyn Action> {
        &self.action
    }
}

/// Mapping from task name to prerequisites and action.
///
/// Built once (from configuration or by hand) and then only read; the runner
/// and the dispatcher share it behind an `Arc`.
#[derive(Debug, Default, Clone)]
pub struct TaskGraph {
    tasks: IndexMap<String, Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if the name is taken. Prerequisites
    /// are not checked here; unknown ones surface when the task is planned.
    pub fn register<I, S, A>(
        &mut self,
        name: impl Into<String>,
        depends_on: I,
        action: A,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        A: Action + 'static,
    {
        self.insert(Task::new(name, depends_on, Arc::new(action)))
    }

    /// Inserts a fully built task, rejecting duplicate names.
    pub fn insert(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(Error::DuplicateTask(task.name));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    /// Replaces (or adds) a task, returning the previous definition.
    pub fn replace(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.name.clone(), task)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn available(&self) -> String {
        self.names().join(", ")
    }

    fn unknown(&self, name: &str, required_by: Option<&str>) -> Error {
        Error::UnknownTask {
            name: name.to_string(),
            required_by: required_by.map(str::to_string),
            available: self.available(),
        }
    }

    /// Computes the execution order for one invocation.
    ///
    /// Prerequisites are visited depth-first in declaration order; every task
    /// appears once, after all of its prerequisites, however many targets or
    /// dependents share it.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTask`] for an unknown target or prerequisite, and
    /// [`Error::CircularDependency`] for a cycle.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();

        for target in targets {
            let target = target.as_ref();
            if !self.contains(target) {
                return Err(self.unknown(target, None));
            }
            self.visit(target, &mut order, &mut visited, &mut visiting)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        order: &mut Vec<String>,
        visited: &mut HashSet<String>,
        visiting: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|n| n == name) {
            let mut cycle: Vec<&str> = visiting[start..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(Error::CircularDependency(cycle.join(" -> ")));
        }

        let task = self
            .get(name)
            .ok_or_else(|| self.unknown(name, visiting.last().map(String::as_str)))?;

        visiting.push(name.to_string());
        for dep in &task.depends_on {
            if !self.contains(dep) {
                return Err(self.unknown(dep, Some(name)));
            }
            self.visit(dep, order, visited, visiting)?;
        }
        visiting.pop();

        visited.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// Checks the whole graph eagerly and returns a topological order
    /// (prerequisites first).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTask`] for the first dangling prerequisite and
    /// [`Error::CircularDependency`] if any cycle exists.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();

        for name in self.tasks.keys() {
            node_map.insert(name.as_str(), graph.add_node(name.clone()));
        }

        for task in self.tasks.values() {
            let from = node_map[task.name.as_str()];
            for dep in &task.depends_on {
                let to = node_map
                    .get(dep.as_str())
                    .ok_or_else(|| self.unknown(dep, Some(&task.name)))?;
                graph.add_edge(from, *to, ());
            }
        }

        let sorted = match toposort(&graph, None) {
            Ok(sorted) => sorted,
            // A walk from a node on the cycle is guaranteed to run into it.
            Err(cycle) => {
                let start = graph[cycle.node_id()].as_str();
                return Err(match self.plan(&[start]) {
                    Err(e @ Error::CircularDependency(_)) => e,
                    _ => Error::CircularDependency(format!("{} -> {}", start, start)),
                });
            }
        };

        Ok(sorted.into_iter().rev().map(|idx| graph[idx].clone()).collect())
    }

    /// Tasks that list `name` as a direct prerequisite.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.tasks
            .values()
            .filter(|t| t.depends_on.iter().any(|d| d == name))
            .map(|t| t.name.clone())
            .collect()
    }
}
