//! Working trees: ephemeral checkouts of upstream repositories

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::filehashes::FileHashes;
use crate::hash::Hasher;
use crate::resolver::RepoPath;
use crate::version::Describable;

mod git;
mod hg;

pub use git::GitWorkingTree;
pub use hg::HgWorkingTree;

/// The version control systems with registered drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VcsKind {
    Git,
    Hg,
}

impl VcsKind {
    /// The driver binary.
    pub fn command(self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Hg => "hg",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "git" => Ok(VcsKind::Git),
            "hg" => Ok(VcsKind::Hg),
            other => Err(Error::UnknownVcs(other.to_string())),
        }
    }
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// A local checkout of an upstream repository, plus the operations the
/// matcher needs from it. One value owns one temporary directory; dropping
/// the tree (or calling [`close`]) removes it.
///
/// [`close`]: WorkingTree::close
pub trait WorkingTree: Describable {
    fn kind(&self) -> VcsKind;

    /// The checkout directory.
    fn root(&self) -> &Path;

    /// The hasher matching this tree's native object hash.
    fn hasher(&self) -> Arc<dyn Hasher>;

    /// Repository tags parseable as semantic versions, sorted newest first.
    fn version_tags(&self) -> Result<Vec<String>>;

    /// Every revision, newest first.
    fn revisions(&self) -> Result<Vec<String>>;

    /// Update the working directory to match `rev`. The checkout must not
    /// have been locally modified.
    fn rev_sync(&self, rev: &str) -> Result<()>;

    /// Resolve a tag to its canonical revision.
    fn revision_from_tag(&self, tag: &str) -> Result<String>;

    /// The (path, hash) pairs visible at `ref_name` under `sub_path`, with
    /// paths made relative to `sub_path` when it is non-empty.
    fn file_hashes_from_ref(&self, ref_name: &str, sub_path: &str) -> Result<FileHashes>;

    /// Copy the checkout file at `path` (relative to the checkout root) to
    /// `sink` with import comments stripped; see [`crate::strip`].
    fn strip_import_comment(&self, path: &str, sink: &mut dyn Write) -> Result<bool> {
        crate::strip::strip_import_comment(&self.root().join(path), sink)
    }

    /// Unified diff of the checkout file at `ref_path` against
    /// `local_path`, written to `sink`; either side may be absent and is
    /// then treated as empty. Returns whether any change exists.
    fn diff(&self, sink: &mut dyn Write, local_path: &Path, ref_path: &str) -> Result<bool> {
        let checkout_side = self.root().join(ref_path);
        unified_diff(sink, &checkout_side, local_path)
    }

    /// Remove the checkout directory. Safe to call once; Drop is the
    /// backstop for error paths.
    fn close(&mut self) -> Result<()>;
}

/// Clone `project.repo` into a fresh temporary directory and return the
/// working tree for it. On any failure the directory is removed.
pub fn new_working_tree(project: &RepoPath) -> Result<Box<dyn WorkingTree>> {
    match project.vcs {
        VcsKind::Git => Ok(Box::new(GitWorkingTree::create(&project.repo)?)),
        VcsKind::Hg => Ok(Box::new(HgWorkingTree::create(&project.repo)?)),
    }
}

/// Output of one driver invocation. Failure to *launch* the driver is an
/// error; a non-zero exit is data, because several callers map specific
/// failure messages to sentinels.
pub(crate) struct DriverOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl DriverOutput {
    /// stderr then stdout, lowercased, for prefix-matching driver errors.
    pub fn merged_lower(&self) -> String {
        let mut merged = self.stderr.to_lowercase();
        merged.push_str(&self.stdout.to_lowercase());
        merged.trim_start().to_string()
    }
}

/// The shared state of a checkout: the temporary directory it lives in and
/// the driver used to query it.
pub(crate) struct Checkout {
    kind: VcsKind,
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Checkout {
    /// Create a temporary directory and clone `repo` into it.
    pub fn create(kind: VcsKind, repo: &str) -> Result<Self> {
        let dir = TempDir::with_prefix("vendor-trace.")
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let path = dir.path().to_path_buf();

        let out = Command::new(kind.command())
            .arg("clone")
            .arg(repo)
            .arg(&path)
            .output()
            .map_err(|e| Error::io(&path, e))?;
        if !out.status.success() {
            // TempDir drop removes the directory
            return Err(Error::Vcs {
                command: format!("{} clone {repo}", kind.command()),
                output: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }

        Ok(Checkout {
            kind,
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the driver inside the checkout, reporting exit status as data.
    pub fn run(&self, args: &[&str]) -> Result<DriverOutput> {
        tracing::debug!("{} {}", self.kind, args.join(" "));
        let out = Command::new(self.kind.command())
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(DriverOutput {
            success: out.status.success(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }

    /// Run the driver, treating any non-zero exit as a hard error.
    pub fn run_ok(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args)?;
        if !out.success {
            return Err(self.failure(args, &out));
        }
        Ok(out.stdout)
    }

    /// The error for a failed invocation.
    pub fn failure(&self, args: &[&str], out: &DriverOutput) -> Error {
        Error::Vcs {
            command: format!("{} {}", self.kind.command(), args.join(" ")),
            output: if out.stderr.is_empty() {
                out.stdout.clone()
            } else {
                out.stderr.clone()
            },
        }
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close().map_err(|e| Error::io(path, e))?;
        }
        Ok(())
    }
}

/// Run `diff -u old new`, mapping missing files to the empty file. Exit
/// status 1 means the files differ; anything above is a failure.
fn unified_diff(sink: &mut dyn Write, old: &Path, new: &Path) -> Result<bool> {
    let devnull = Path::new("/dev/null");
    let old_side = if old.is_file() { old } else { devnull };
    let new_side = if new.is_file() { new } else { devnull };

    let out = Command::new("diff")
        .arg("-u")
        .arg(old_side)
        .arg(new_side)
        .output()
        .map_err(|e| Error::io(old_side, e))?;

    match out.status.code() {
        Some(0) => Ok(false),
        Some(1) => {
            sink.write_all(&out.stdout)
                .map_err(|e| Error::io(new_side, e))?;
            Ok(true)
        }
        _ => Err(Error::Vcs {
            command: format!("diff -u {} {}", old_side.display(), new_side.display()),
            output: String::from_utf8_lossy(&out.stderr).into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_vcs_kind_names() {
        assert_eq!(VcsKind::Git.command(), "git");
        assert_eq!(VcsKind::Hg.command(), "hg");
        assert!(matches!(VcsKind::from_name("git"), Ok(VcsKind::Git)));
        assert!(matches!(
            VcsKind::from_name("bzr"),
            Err(Error::UnknownVcs(_))
        ));
    }

    #[test]
    fn test_unified_diff_reports_changes() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.go");
        let b = tmp.path().join("b.go");
        fs::write(&a, "package a\n").unwrap();
        fs::write(&b, "package b\n").unwrap();

        let mut out = Vec::new();
        assert!(unified_diff(&mut out, &a, &b).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("-package a"));
        assert!(text.contains("+package b"));
    }

    #[test]
    fn test_unified_diff_identical() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.go");
        fs::write(&a, "package a\n").unwrap();

        let mut out = Vec::new();
        assert!(!unified_diff(&mut out, &a, &a).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_unified_diff_absent_side_is_empty() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.go");
        fs::write(&a, "package a\n").unwrap();

        let mut out = Vec::new();
        assert!(unified_diff(&mut out, &tmp.path().join("absent.go"), &a).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("+package a"));
    }
}
