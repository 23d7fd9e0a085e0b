//! Shared test fixtures

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::filehashes::FileHashes;
use crate::hash::{FileHash, Hasher, Sha256Hasher};
use crate::resolver::RepoPath;
use crate::source::GoSource;
use crate::vcs::{VcsKind, WorkingTree};
use crate::version::Describable;

pub const REV: &str = "d4c3dbfa77a74ae238e401d5d2197b45f30d8513";
pub const OLD_REV: &str = "20d88e05c2a5f1571e979a2eaa45d8e901b92b99";

/// A scripted upstream: hash tables per ref, tag→rev mapping, and
/// describe results, with no subprocesses involved.
pub struct StubTree {
    pub root: PathBuf,
    pub tags: Vec<String>,
    pub revisions: Vec<String>,
    pub hashes_by_ref: HashMap<String, BTreeMap<String, FileHash>>,
    pub invalid_refs: HashSet<String>,
    pub tag_revs: HashMap<String, String>,
    pub reachable: HashMap<String, String>,
}

impl StubTree {
    pub fn new() -> Self {
        StubTree {
            root: PathBuf::from("/nonexistent"),
            tags: Vec::new(),
            revisions: Vec::new(),
            hashes_by_ref: HashMap::new(),
            invalid_refs: HashSet::new(),
            tag_revs: HashMap::new(),
            reachable: HashMap::new(),
        }
    }

    pub fn with_ref(mut self, ref_name: &str, entries: &[(&str, &FileHash)]) -> Self {
        self.hashes_by_ref.insert(
            ref_name.to_string(),
            entries
                .iter()
                .map(|(p, h)| (p.to_string(), (*h).clone()))
                .collect(),
        );
        self
    }
}

impl Describable for StubTree {
    fn reachable_tag(&self, rev: &str) -> Result<String> {
        self.reachable
            .get(rev)
            .cloned()
            .ok_or(Error::VersionNotFound)
    }

    fn time_from_revision(&self, _rev: &str) -> Result<DateTime<Utc>> {
        Ok(Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap())
    }
}

impl WorkingTree for StubTree {
    fn kind(&self) -> VcsKind {
        VcsKind::Hg
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn hasher(&self) -> Arc<dyn Hasher> {
        Arc::new(Sha256Hasher)
    }

    fn version_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    fn revisions(&self) -> Result<Vec<String>> {
        Ok(self.revisions.clone())
    }

    fn rev_sync(&self, _rev: &str) -> Result<()> {
        Ok(())
    }

    fn revision_from_tag(&self, tag: &str) -> Result<String> {
        self.tag_revs
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::Parse(format!("unknown tag {tag}")))
    }

    fn file_hashes_from_ref(&self, ref_name: &str, _sub_path: &str) -> Result<FileHashes> {
        if self.invalid_refs.contains(ref_name) {
            return Err(Error::InvalidRef);
        }
        let entries = self
            .hashes_by_ref
            .get(ref_name)
            .cloned()
            .unwrap_or_default();
        Ok(FileHashes::from_entries(self.hasher(), entries))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// SHA-256 of `content`, as a FileHash.
pub fn sha(content: &str) -> FileHash {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("f");
    fs::write(&path, content).unwrap();
    Sha256Hasher.hash("f", &path).unwrap()
}

/// Local tree with one package file, plus noise the matcher must drop.
pub fn local_project(content: &str) -> (TempDir, GoSource, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("src");
    fs::create_dir_all(dir.join(".git")).unwrap();
    fs::create_dir_all(dir.join("vendor/github.com/x/y")).unwrap();
    fs::write(dir.join("bar.go"), content).unwrap();
    fs::write(dir.join(".hidden"), "x").unwrap();
    fs::write(dir.join(".git/config"), "x").unwrap();
    fs::write(dir.join("vendor/github.com/x/y/y.go"), "package y\n").unwrap();

    let src = GoSource::new(&dir, &[]).unwrap();
    (tmp, src, dir)
}

/// A project at example.com/foo/bar, optionally pinned to a version.
pub fn project(version: Option<&str>) -> RepoPath {
    let mut rp = RepoPath::new(
        "example.com/foo/bar",
        "https://example.com/foo/bar",
        VcsKind::Hg,
    );
    rp.version = version.map(str::to_string);
    rp
}
