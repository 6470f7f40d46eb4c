//! Error types for the dev server.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Cannot serve {0}: not a directory")]
    InvalidRoot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServeError> for sluice_core::Error {
    fn from(error: ServeError) -> Self {
        sluice_core::Error::Server(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServeError>;
