/// Jar handling error types
use std::path::PathBuf;
use thiserror::Error;

pub type JarResult<T> = Result<T, JarError>;

#[derive(Debug, Error)]
pub enum JarError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Archive error in {path}: {source}")]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("Malformed class file '{name}': {reason}")]
    ClassFile { name: String, reason: String },

    #[error("Not a jar or directory: {0}")]
    UnsupportedEntry(PathBuf),
}

impl JarError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an archive error with path context
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed classfile error
    pub fn class_file(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::ClassFile {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
