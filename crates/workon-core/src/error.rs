//! Error types shared by the workflow engine.

use std::path::PathBuf;

use thiserror::Error;

/// A single invocation of the external tool that did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}\n{output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },
}

impl CommandError {
    /// Output captured from the failing invocation, if any.
    pub fn output(&self) -> &str {
        match self {
            Self::Spawn { .. } => "",
            Self::Failed { output, .. } => output,
        }
    }
}

/// Errors that stop a workflow run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("interrupted")]
    Interrupted,
}

impl WorkflowError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
