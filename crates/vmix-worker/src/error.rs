//! Pipeline error types.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Stage-tagged pipeline failure.
///
/// `Display` is the bare message so it can be surfaced unchanged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    PartialGeneration(String),

    #[error("{0}")]
    Synthesis(String),

    #[error("{0}")]
    Composition(String),

    #[error("{0}")]
    Storage(#[from] vmix_storage::StorageError),

    #[error("{0}")]
    Download(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Provider(_) => ErrorKind::Provider,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::PartialGeneration(_) => ErrorKind::PartialGeneration,
            PipelineError::Synthesis(_) => ErrorKind::Synthesis,
            PipelineError::Composition(_) => ErrorKind::Composition,
            PipelineError::Storage(_) => ErrorKind::Storage,
            PipelineError::Download(_) => ErrorKind::Download,
            PipelineError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<vmix_providers::ProviderError> for PipelineError {
    fn from(err: vmix_providers::ProviderError) -> Self {
        match err {
            vmix_providers::ProviderError::Timeout { .. } => Self::Timeout(err.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Failure category that survives the job boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Provider,
    Timeout,
    PartialGeneration,
    Synthesis,
    Composition,
    Storage,
    Download,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Provider => "provider",
            ErrorKind::Timeout => "timeout",
            ErrorKind::PartialGeneration => "partial_generation",
            ErrorKind::Synthesis => "synthesis",
            ErrorKind::Composition => "composition",
            ErrorKind::Storage => "storage",
            ErrorKind::Download => "download",
            ErrorKind::Io => "io",
        }
    }

    /// Whether the caller, not the pipeline, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::Validation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single failure returned by a job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<PipelineError> for JobFailure {
    fn from(err: PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
