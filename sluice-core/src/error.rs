//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path}: {source}")]
    IoPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}. Run 'sluice init' to create a starter 'sluice.toml'.")]
    ConfigNotFound(PathBuf),

    #[error("Unknown task: {name}{}. Available tasks: {available}", required_by_suffix(.required_by))]
    UnknownTask {
        name: String,
        required_by: Option<String>,
        available: String,
    },

    #[error("Task '{0}' is already registered. Use replace() to override it explicitly.")]
    DuplicateTask(String),

    #[error("Circular dependency detected: {0}. Use 'sluice list' to inspect task prerequisites.")]
    CircularDependency(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Transform '{step}' failed for {}: {message}", .path.display())]
    Transform {
        step: String,
        path: PathBuf,
        message: String,
    },

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Dev server error: {0}")]
    Server(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Mutex lock error: {0}")]
    MutexLock(String),
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(parent) => format!(" (required by '{}')", parent),
        None => String::new(),
    }
}

impl Error {
    /// Attaches a path to a bare IO error.
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoPath {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors caused by the task configuration rather than
    /// by running an action.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Config(_)
            | Error::ConfigNotFound(_)
            | Error::Toml { .. }
            | Error::UnknownTask { .. }
            | Error::DuplicateTask(_)
            | Error::CircularDependency(_)
            | Error::InvalidGlob { .. } => true,
            Error::TaskFailed { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "sluice.toml".to_string(),
        }
    }
}

impl From<glob::PatternError> for Error {
    fn from(error: glob::PatternError) -> Self {
        Error::InvalidGlob {
            pattern: String::new(),
            message: error.to_string(),
        }
    }
}

impl From<notify::Error> for Error {
    fn from(error: notify::Error) -> Self {
        Error::Watcher(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
