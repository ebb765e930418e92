//! Error taxonomy of the command core.
//!
//! Every variant except [`ShellError::EmptyInput`] is turned into a failed
//! [`ExecutionResult`](crate::command::ExecutionResult) by the dispatcher, so
//! none of them ever reaches the REPL as a fault.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    /// The input line was blank. Callers ignore it.
    #[error("empty input")]
    EmptyInput,

    #[error("{}: no such file or directory", .0.display())]
    PathNotFound(PathBuf),

    #[error("{}: not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{}: directory not empty (use -r)", .0.display())]
    DirectoryNotEmpty(PathBuf),

    #[error("{}: already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{}: parent directory does not exist", .0.display())]
    ParentNotFound(PathBuf),

    #[error("{}: permission denied", .0.display())]
    Permission(PathBuf),

    /// A glob pattern matched nothing. Recovered by passing the pattern through.
    #[error("no match for pattern: {0}")]
    NoGlobMatch(String),

    #[error("{0}")]
    InvalidSyntax(String),

    #[error("{program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ShellError {
    /// Classify an I/O failure on `path` into the taxonomy.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ShellError::PathNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ShellError::Permission(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => ShellError::AlreadyExists(path.to_path_buf()),
            io::ErrorKind::NotADirectory => ShellError::NotADirectory(path.to_path_buf()),
            io::ErrorKind::DirectoryNotEmpty => ShellError::DirectoryNotEmpty(path.to_path_buf()),
            _ => ShellError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}
