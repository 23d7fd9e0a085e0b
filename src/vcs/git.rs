//! The git working-tree backend

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::filehashes::FileHashes;
use crate::hash::{hasher_for, FileHash, Hasher};
use crate::version::{sort_tags_newest_first, Describable};

use super::{Checkout, VcsKind, WorkingTree};

/// Tag globs likely to match semver tags, tried in order by `reachable_tag`.
const DESCRIBE_GLOBS: [&str; 2] = ["v[0-9]*", "[0-9]*"];

pub struct GitWorkingTree {
    checkout: Checkout,
}

impl GitWorkingTree {
    /// Clone `repo` into a fresh temporary checkout.
    pub fn create(repo: &str) -> Result<Self> {
        Ok(GitWorkingTree {
            checkout: Checkout::create(VcsKind::Git, repo)?,
        })
    }

    /// A tree over an existing checkout directory. Used by tests; the
    /// directory is not removed on close.
    #[cfg(test)]
    pub(crate) fn open(path: &Path) -> Self {
        GitWorkingTree {
            checkout: Checkout {
                kind: VcsKind::Git,
                dir: None,
                path: path.to_path_buf(),
            },
        }
    }
}

impl Describable for GitWorkingTree {
    /// The most recent reachable semver-like tag, via
    /// `git describe --tags --match=<glob>`.
    fn reachable_tag(&self, rev: &str) -> Result<String> {
        let mut tag = String::new();
        for glob in DESCRIBE_GLOBS {
            let pattern = format!("--match={glob}");
            let args = ["describe", "--tags", pattern.as_str(), rev];
            let out = self.checkout.run(&args)?;
            if out.success {
                tag = out.stdout.trim().to_string();
                break;
            }

            // Catch failures due to not finding an appropriate tag:
            //   fatal: no tag exactly matches ...
            //   fatal: no tags can describe ...
            //   fatal: no names found, cannot describe anything.
            //   fatal: no annotated tags can describe ...
            let merged = out.merged_lower();
            if !merged.starts_with("fatal: no tag")
                && !merged.starts_with("fatal: no names")
                && !merged.starts_with("fatal: no annotated tag")
            {
                return Err(self.checkout.failure(&args, &out));
            }
        }

        if tag.is_empty() {
            return Err(Error::VersionNotFound);
        }
        tracing::debug!("{rev} is described as {tag}");

        // Strip the "-N-gSHA" suffix; describe output with fewer dash
        // fields matched a tag exactly.
        let fields: Vec<&str> = tag.split('-').collect();
        if fields.len() < 3 {
            return Ok(tag);
        }
        Ok(fields[..fields.len() - 2].join("-"))
    }

    /// Committer time, via `git show -s --pretty=format:%cI`.
    fn time_from_revision(&self, rev: &str) -> Result<DateTime<Utc>> {
        let stdout = self
            .checkout
            .run_ok(&["show", "-s", "--pretty=format:%cI", rev])?;
        let instant = DateTime::parse_from_rfc3339(stdout.trim())
            .map_err(|e| Error::Parse(format!("commit time {:?}: {e}", stdout.trim())))?;
        Ok(instant.with_timezone(&Utc))
    }
}

impl WorkingTree for GitWorkingTree {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn root(&self) -> &Path {
        self.checkout.path()
    }

    fn hasher(&self) -> Arc<dyn Hasher> {
        hasher_for(VcsKind::Git)
    }

    fn version_tags(&self) -> Result<Vec<String>> {
        let stdout = self.checkout.run_ok(&["tag"])?;
        Ok(sort_tags_newest_first(
            stdout.lines().map(|l| l.trim().to_string()),
        ))
    }

    /// All revisions, newest first, via `git rev-list --all`.
    fn revisions(&self) -> Result<Vec<String>> {
        let stdout = self.checkout.run_ok(&["rev-list", "--all"])?;
        Ok(stdout.lines().map(|l| l.trim().to_string()).collect())
    }

    fn rev_sync(&self, rev: &str) -> Result<()> {
        self.checkout.run_ok(&["checkout", rev])?;
        Ok(())
    }

    fn revision_from_tag(&self, tag: &str) -> Result<String> {
        let stdout = self.checkout.run_ok(&["rev-parse", tag])?;
        Ok(stdout.trim().to_string())
    }

    /// Parse `git ls-tree -r` output into a hash table.
    fn file_hashes_from_ref(&self, ref_name: &str, sub_path: &str) -> Result<FileHashes> {
        let mut args = vec!["ls-tree", "-r", ref_name];
        if !sub_path.is_empty() {
            args.push(sub_path);
        }
        let out = self.checkout.run(&args)?;
        if !out.success {
            let merged = out.merged_lower();
            // a branch name, or a ref not present in this repository
            if merged.starts_with("fatal: not a valid object name")
                || merged.starts_with("fatal: not a tree object")
            {
                return Err(Error::InvalidRef);
            }
            return Err(self.checkout.failure(&args, &out));
        }

        let mut entries = Vec::new();
        for line in out.stdout.lines() {
            // <mode> SP <type> SP <object> TAB <path>; the path may
            // contain spaces, so split on the TAB first.
            let (meta, filename) = line
                .split_once('\t')
                .ok_or_else(|| Error::Parse(format!("expected TAB: {line}")))?;
            let fields: Vec<&str> = meta.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(Error::Parse(format!("expected 3 fields: {meta}")));
            }

            let relative = if sub_path.is_empty() {
                filename.to_string()
            } else {
                filename
                    .strip_prefix(sub_path)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .ok_or_else(|| {
                        Error::Parse(format!("{filename} is not beneath {sub_path}"))
                    })?
                    .to_string()
            };
            entries.push((relative, FileHash::from(fields[2])));
        }

        Ok(FileHashes::from_entries(self.hasher(), entries))
    }

    fn close(&mut self) -> Result<()> {
        self.checkout.close()
    }
}
