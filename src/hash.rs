//! Per-VCS content hashing

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::vcs::VcsKind;

/// The hash of a file, in the format preferred by the version control
/// system that tracks it. Equality is literal string equality; the meaning
/// of the digest depends on the [`Hasher`] that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHash(String);

impl FileHash {
    pub fn new(hex: impl Into<String>) -> Self {
        FileHash(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileHash {
    fn from(s: &str) -> Self {
        FileHash(s.to_string())
    }
}

/// Hashes one file the way the upstream repository would.
pub trait Hasher: Send + Sync {
    /// Hash the file at `abs_path`, as though it were stored in the
    /// repository at `relative_path`. The relative path only matters for
    /// hashers with path-dependent filters (git CRLF attributes).
    fn hash(&self, relative_path: &str, abs_path: &Path) -> Result<FileHash>;
}

/// Git blob hashing, delegated to `git hash-object` so that attribute
/// filters are applied exactly as upstream would apply them.
pub struct GitHasher;

impl Hasher for GitHasher {
    fn hash(&self, relative_path: &str, abs_path: &Path) -> Result<FileHash> {
        let output = Command::new("git")
            .arg("hash-object")
            .arg("--path")
            .arg(relative_path)
            .arg(abs_path)
            .output()
            .map_err(|e| Error::io(abs_path, e))?;
        if !output.status.success() {
            return Err(Error::Vcs {
                command: format!("git hash-object --path {relative_path}"),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let hex = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(FileHash(hex))
    }
}

/// Generic content hashing: lowercase hex SHA-256 of the raw bytes.
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, _relative_path: &str, abs_path: &Path) -> Result<FileHash> {
        let bytes = std::fs::read(abs_path).map_err(|e| Error::io(abs_path, e))?;
        let digest = Sha256::digest(&bytes);
        Ok(FileHash(format!("{digest:x}")))
    }
}

/// Select the hasher matching the native object hash of `kind`.
pub fn hasher_for(kind: VcsKind) -> Arc<dyn Hasher> {
    match kind {
        VcsKind::Git => Arc::new(GitHasher),
        VcsKind::Hg => Arc::new(Sha256Hasher),
    }
}
