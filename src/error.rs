use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Machine-readable failure classification, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ExecutionFailure,
    ResultReadFailure,
    ResultParseFailure,
    InvalidInput,
    TimedOut,
    Cancelled,
    BootstrapFailure,
}

/// Everything a detection call can fail with.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// The program could not be spawned or exited non-zero.
    #[error("{program} failed: {detail}")]
    Execution { program: String, detail: String },

    #[error("cannot read {}: {source}", .path.display())]
    ResultRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON from {origin}: {source}")]
    ResultParse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid image path {path:?}: {detail}")]
    InvalidInput { path: PathBuf, detail: String },

    #[error("{program} did not finish within {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("cannot create {}: {source}", .path.display())]
    Bootstrap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DetectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectionError::Execution { .. } => ErrorKind::ExecutionFailure,
            DetectionError::ResultRead { .. } => ErrorKind::ResultReadFailure,
            DetectionError::ResultParse { .. } => ErrorKind::ResultParseFailure,
            DetectionError::InvalidInput { .. } => ErrorKind::InvalidInput,
            DetectionError::TimedOut { .. } => ErrorKind::TimedOut,
            DetectionError::Cancelled { .. } => ErrorKind::Cancelled,
            DetectionError::Bootstrap { .. } => ErrorKind::BootstrapFailure,
        }
    }

    /// Short reason suitable for returning to an API client.
    pub fn reason(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ExecutionFailure => "Model execution failed",
            ErrorKind::ResultReadFailure => "Failed to read model output",
            ErrorKind::ResultParseFailure => "Invalid JSON format in model output",
            ErrorKind::InvalidInput => "Invalid image path",
            ErrorKind::TimedOut => "Model execution timed out",
            ErrorKind::Cancelled => "Model execution cancelled",
            ErrorKind::BootstrapFailure => "Failed to prepare output directories",
        }
    }
}

/// Result type with default DetectionError
pub type Result<T, E = DetectionError> = std::result::Result<T, E>;
