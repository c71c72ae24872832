use std::path::PathBuf;
use thiserror::Error;

/// Failure while decoding or encoding a metadata container.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("malformed metadata: {0}")]
    Malformed(String),
    #[error("failed to encode metadata: {0}")]
    Encode(String),
}

/// Terminal failure of a metadata commit.
///
/// `Parse` is reported as soon as loading fails and is never retried.
/// `Write` is only reported once every write attempt has failed; it carries
/// the cause of the last attempt.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to read metadata from {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },
    #[error("failed to write metadata to {} after {attempts} attempt(s)", .path.display())]
    Write {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: ContainerError,
    },
}

impl CommitError {
    /// The file the failed commit was targeting.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Parse { path, .. } | Self::Write { path, .. } => path,
        }
    }
}
