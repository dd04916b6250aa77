//! Error types for the CLI

use std::path::PathBuf;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Tessera(#[from] tessera_common::Error),

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] tessera_common::telemetry::TelemetryError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid Worker document {path}: {message}")]
    InvalidWorker { path: PathBuf, message: String },
}

impl Error {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_worker(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::InvalidWorker {
            path: path.into(),
            message: message.into(),
        }
    }
}
