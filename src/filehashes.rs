//! File hash tables with subset comparison

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::hash::{FileHash, Hasher};

/// A map of paths, relative to the top level of a tree, to their hashes.
///
/// The struct carries the [`Hasher`] that produced every entry, so that any
/// later re-hashing (the import-comment mutation transform) is forced to use
/// the same hash function.
pub struct FileHashes {
    hasher: Arc<dyn Hasher>,
    hashes: BTreeMap<String, FileHash>,
}

impl FileHashes {
    /// An empty table tied to `hasher`.
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        FileHashes {
            hasher,
            hashes: BTreeMap::new(),
        }
    }

    /// Build a table from already-computed entries (e.g. parsed from
    /// `git ls-tree` output, where upstream did the hashing for us).
    pub fn from_entries(
        hasher: Arc<dyn Hasher>,
        entries: impl IntoIterator<Item = (String, FileHash)>,
    ) -> Self {
        FileHashes {
            hasher,
            hashes: entries.into_iter().collect(),
        }
    }

    /// Hash every regular file beneath `root`.
    ///
    /// Paths exactly present in `excludes` are skipped; an excluded
    /// directory prunes its whole subtree. A `.gitattributes` file in any
    /// visited directory extends a private copy of the exclude set with the
    /// files it marks `export-subst` (their upstream hashes are taken after
    /// keyword substitution, so they can never match). The caller's set is
    /// never mutated. Traversal is lexicographic depth-first; symlinks and
    /// other non-regular entries yield no entry.
    pub fn new_from_tree(
        hasher: Arc<dyn Hasher>,
        root: &Path,
        excludes: &BTreeSet<PathBuf>,
    ) -> Result<Self> {
        let mut out = FileHashes::new(hasher);
        let mut excl = excludes.clone();

        let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                match e.into_io_error() {
                    Some(io) => Error::io(path, io),
                    None => Error::Parse("filesystem loop".to_string()),
                }
            })?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                if excl.contains(path) {
                    walker.skip_current_dir();
                    continue;
                }
                read_gitattribute_excludes(path, &mut excl)?;
                continue;
            }

            if excl.contains(path) || !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_slash_path(root, path)?;
            let hash = out.hasher.hash(&relative, path)?;
            out.hashes.insert(relative, hash);
        }

        Ok(out)
    }

    /// The hasher every entry was produced by.
    pub fn hasher(&self) -> Arc<dyn Hasher> {
        Arc::clone(&self.hasher)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileHash> {
        self.hashes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.hashes.contains_key(path)
    }

    /// Relative paths in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.hashes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileHash)> {
        self.hashes.iter().map(|(p, h)| (p.as_str(), h))
    }

    /// Replace (or add) one entry. The hash must come from [`hasher`];
    /// callers re-hash through [`FileHashes::hasher`] to keep the invariant.
    ///
    /// [`hasher`]: FileHashes::hasher
    pub fn set(&mut self, path: impl Into<String>, hash: FileHash) {
        self.hashes.insert(path.into(), hash);
    }

    /// Drop every entry whose path fails the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.hashes.retain(|path, _| keep(path));
    }

    /// True if every (path, hash) entry of `self` is present, with an
    /// identical hash, in `other`.
    pub fn is_subset_of(&self, other: &FileHashes) -> bool {
        self.mismatches(other, true).is_empty()
    }

    /// Paths of `self` that are absent from `other` or hashed differently.
    /// With `fail_fast` at most one mismatch is returned.
    pub fn mismatches(&self, other: &FileHashes, fail_fast: bool) -> Vec<String> {
        let mut mismatches = Vec::new();
        for (path, hash) in &self.hashes {
            match other.hashes.get(path) {
                None => {
                    tracing::debug!("{path}: not present");
                    mismatches.push(path.clone());
                }
                Some(h) if h != hash => {
                    tracing::debug!("{path}: hash mismatch");
                    mismatches.push(path.clone());
                }
                Some(_) => {}
            }
            if fail_fast && !mismatches.is_empty() {
                break;
            }
        }
        mismatches
    }
}

/// `path - root`, with OS separators normalized to `/`.
fn relative_slash_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        Error::Parse(format!(
            "{} is not beneath {}",
            path.display(),
            root.display()
        ))
    })?;
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    Ok(out)
}

/// Read `<dir>/.gitattributes`, adding `<dir>/<pattern>` to `excl` for
/// every line carrying the `export-subst` attribute. Only whitespace
/// splitting is implemented; richer gitattributes(5) semantics are not.
fn read_gitattribute_excludes(dir: &Path, excl: &mut BTreeSet<PathBuf>) -> Result<()> {
    let attrs = dir.join(".gitattributes");
    let content = match std::fs::read_to_string(&attrs) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(attrs, e)),
    };
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else { continue };
        if fields.any(|f| f == "export-subst") {
            excl.insert(dir.join(name));
        }
    }
    Ok(())
}
