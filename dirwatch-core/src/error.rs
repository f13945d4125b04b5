use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a watch cycle (or stop the poll loop).
///
/// Per-candidate and per-directory problems are not represented here: they are
/// logged where they happen and recorded in the cycle report instead.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("required option {0} is not set")]
    MissingOption(&'static str),

    #[error("invalid value {value:?} for option {option}")]
    InvalidOption { option: &'static str, value: String },

    #[error("target directory {} was not found", .0.display())]
    TargetDirMissing(PathBuf),

    #[error("source directory {} was not found", .0.display())]
    SourceDirMissing(PathBuf),

    #[error("another dirwatch instance holds the lock {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("{operation} failed for {}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WatchError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        WatchError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
