/// Driver error types
use std::path::PathBuf;
use thiserror::Error;

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Required toolchain artifact missing or unreadable: {path}")]
    ArtifactMissing { path: PathBuf },

    #[error("Invalid compilation task: {0}")]
    InvalidTask(String),

    #[error("Dependency report error at {path}: {reason}")]
    Report { path: PathBuf, reason: String },

    #[error("Archive error: {0}")]
    Jar(#[from] kotbuild_jar::JarError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Compiler service error: {0}")]
    Service(String),
}

impl DriverError {
    /// Create an artifact-missing error
    pub fn artifact_missing(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactMissing { path: path.into() }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a dependency report error
    pub fn report(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Report {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
