use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchDiffError {
    #[error("unsupported archive format ({extension}): {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt container {}: {reason}", path.display())]
    ContainerCorrupt { path: PathBuf, reason: String },

    #[error("failed to process file: {path}: {reason}")]
    EntryRead { path: String, reason: String },

    #[error("invalid {which} regex: {source}")]
    FilterCompile {
        which: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ArchDiffError {
    /// Whole-container failure for `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ArchDiffError::ContainerCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchDiffError::Open {
            path: path.into(),
            source,
        }
    }

    /// Failure of a single member within a container
    pub fn entry(path: impl Into<String>, reason: impl ToString) -> Self {
        ArchDiffError::EntryRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchDiffError>;
