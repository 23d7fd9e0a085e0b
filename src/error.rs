//! Error types for vendor-trace

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for vendor-trace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vendor-trace operations.
///
/// `VersionNotFound` and `InvalidRef` are sentinels: the matcher recovers
/// from them (phase fallthrough and candidate skipping respectively), so
/// they must stay matchable rather than being flattened into strings.
#[derive(Debug, Error)]
pub enum Error {
    /// No candidate ref matched the local files.
    #[error("version not found")]
    VersionNotFound,

    /// A specific ref cannot be queried at upstream (e.g. a branch name
    /// offered where a tree-ish was expected). Non-fatal for one candidate.
    #[error("invalid ref")]
    InvalidRef,

    /// The version control system has no registered driver.
    #[error("unknown version control system: {0}")]
    UnknownVcs(String),

    /// The top-level import path was not provided and could not be inferred.
    #[error("cannot determine import path (provide it with --import-path)")]
    NeedImportPath,

    /// The local source under inspection has no hashable files.
    #[error("no files to hash")]
    NoFiles,

    /// The supplied path is not a Go source tree.
    #[error("no Go source code found at {}", .0.display())]
    NoSource(PathBuf),

    /// A VCS subprocess exited unsuccessfully.
    #[error("{command} failed: {output}")]
    Vcs { command: String, output: String },

    /// Subprocess output or a manifest could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// Filesystem failure, with the path that triggered it.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
