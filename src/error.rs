//! Error types for perfil

use std::fmt;

/// Errors surfaced by the profiling engine.
#[derive(Debug)]
pub enum ProfilerError {
    /// Configuration rejected by validation
    InvalidConfiguration(String),
    /// Filesystem failure while loading or persisting datasets
    Io(std::io::Error),
    /// Dataset (de)serialization failure
    Serialization(serde_json::Error),
    /// Report generation failure reported by a collaborator
    Report(String),
}

impl fmt::Display for ProfilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfilerError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {msg}")
            }
            ProfilerError::Io(err) => write!(f, "I/O error: {err}"),
            ProfilerError::Serialization(err) => write!(f, "serialization error: {err}"),
            ProfilerError::Report(msg) => write!(f, "report generation failed: {msg}"),
        }
    }
}

impl std::error::Error for ProfilerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProfilerError::Io(err) => Some(err),
            ProfilerError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProfilerError {
    fn from(err: std::io::Error) -> Self {
        ProfilerError::Io(err)
    }
}

impl From<serde_json::Error> for ProfilerError {
    fn from(err: serde_json::Error) -> Self {
        ProfilerError::Serialization(err)
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ProfilerError>;
