use std::path::PathBuf;

use thiserror::Error;

/// Core error type for Crewflow.
#[derive(Debug, Error)]
pub enum CrewflowError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown agent '{0}' referenced by task")]
    UnknownAgent(String),
    #[error("search request failed: {0}")]
    Search(#[from] reqwest::Error),
    #[error("search endpoint returned status {0}")]
    SearchStatus(reqwest::StatusCode),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrewflowError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}
