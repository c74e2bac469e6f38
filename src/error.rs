use std::{io, path::PathBuf};

/// Errors that can occur when using the log roller.
#[derive(Debug, thiserror::Error)]
pub enum RollerError {
    #[error("Write length {len} exceeds maximum file size {max}")]
    PayloadTooLarge { len: u64, max: u64 },
    #[error("Invalid log file name '{0}'")]
    InvalidFilename(PathBuf),
    #[error("Failed to create directory '{path}': {error}")]
    CreateDirectoryFailed { path: PathBuf, error: io::Error },
    #[error("Failed to get file info for '{path}': {error}")]
    StatFailed { path: PathBuf, error: io::Error },
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: io::Error },
    #[error("Failed to preserve ownership of '{path}': {error}")]
    PreserveOwnerFailed { path: PathBuf, error: io::Error },
    #[error("Failed to create file '{path}': {error}")]
    CreateFileFailed { path: PathBuf, error: io::Error },
    /// A write stopped part way. `written` bytes reached the file and were
    /// counted towards its size.
    #[error("Failed to write to '{path}' after {written} bytes: {source}")]
    Write {
        path: PathBuf,
        written: usize,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read log directory '{path}': {error}")]
    ListDirectoryFailed { path: PathBuf, error: io::Error },
    #[error("Failed to compress '{path}': {error}")]
    CompressFailed { path: PathBuf, error: io::Error },
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
}

impl RollerError {
    fn kind(&self) -> io::ErrorKind {
        match self {
            RollerError::PayloadTooLarge { .. } | RollerError::InvalidFilename(_) => io::ErrorKind::InvalidInput,
            RollerError::CreateDirectoryFailed { error, .. }
            | RollerError::StatFailed { error, .. }
            | RollerError::RenameFileError { error, .. }
            | RollerError::PreserveOwnerFailed { error, .. }
            | RollerError::CreateFileFailed { error, .. }
            | RollerError::ListDirectoryFailed { error, .. }
            | RollerError::CompressFailed { error, .. } => error.kind(),
            RollerError::Write { source, .. } => source.kind(),
            RollerError::FileIOError(error) => error.kind(),
        }
    }
}

impl From<RollerError> for io::Error {
    fn from(err: RollerError) -> Self {
        match err {
            RollerError::FileIOError(error) => error,
            other => io::Error::new(other.kind(), other),
        }
    }
}
