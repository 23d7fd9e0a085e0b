//! Go source trees and their configuration

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest;
use crate::resolver::{DefaultResolver, RepoPath, RepoPathResolver};

// package foo // import "example.com/foo"
static IMPORT_COMMENT_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^package\s+\w+\s+(?://|/\*)\s*import\s+["`]([^"`]+)["`]"#)
        .expect("import path pattern")
});

/// A filesystem tree containing Go source code, together with everything
/// the identification engine needs to know about it: the top-level import
/// path (when known), the exclusion set, repository replacements and
/// pinned versions from manifests, and whether godep rewrote the vendored
/// files.
pub struct GoSource {
    /// Top-level path of the tree.
    pub path: PathBuf,

    /// Import path of the top-level project, when known.
    pub package: Option<String>,

    /// Label distinguishing this tree in a multi-project run: the
    /// subdirectory name, or `""` for a tree found at the search root.
    pub sub_path: String,

    /// Whether godep manages the vendor tree.
    pub uses_godep: bool,

    excludes: BTreeSet<PathBuf>,
    versions: HashMap<String, String>,
    replacements: HashMap<String, RepoPath>,
    resolver: Arc<dyn RepoPathResolver>,
}

impl GoSource {
    /// Model the Go source tree at `path`. Fails with
    /// [`Error::NoSource`] when the path does not hold Go source code.
    pub fn new(path: impl Into<PathBuf>, exclude_globs: &[String]) -> Result<Self> {
        GoSource::with_resolver(path, exclude_globs, Arc::new(DefaultResolver))
    }

    /// As [`GoSource::new`], with an injected repo-path resolver.
    pub fn with_resolver(
        path: impl Into<PathBuf>,
        exclude_globs: &[String],
        resolver: Arc<dyn RepoPathResolver>,
    ) -> Result<Self> {
        let path = path.into();
        if !is_go_source_tree(&path) {
            return Err(Error::NoSource(path));
        }

        let info = manifest::detect(&path)?;
        let excludes = find_excludes(&path, exclude_globs)?;

        Ok(GoSource {
            path,
            package: info.package,
            sub_path: String::new(),
            uses_godep: info.uses_godep,
            excludes,
            versions: info.versions,
            replacements: info.replacements,
            resolver,
        })
    }

    /// The path holding vendored source code.
    pub fn vendor(&self) -> PathBuf {
        self.path.join("vendor")
    }

    /// Filesystem paths the hashing walk must skip.
    pub fn excludes(&self) -> &BTreeSet<PathBuf> {
        &self.excludes
    }

    /// Information about the top-level project. With an empty
    /// `import_path` the path is taken from the manifests, then from
    /// import comments in the tree, then from the filesystem path itself.
    pub fn project(&self, import_path: Option<&str>) -> Result<RepoPath> {
        let import_path = match import_path {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => match &self.package {
                Some(p) => p.clone(),
                None => self.find_import_path()?,
            },
        };

        let mut repo_path = self.repo_path_for_import_path(&import_path)?;
        // The package of interest may live beneath the repository root
        if let Some(rest) = import_path.strip_prefix(repo_path.root.as_str()) {
            if let Some(sub) = rest.strip_prefix('/') {
                repo_path.sub_path = sub.to_string();
            }
        }
        Ok(repo_path)
    }

    /// Resolve an import path to its repository, consulting manifest
    /// replacements before the resolver, and attaching any pinned version.
    pub fn repo_path_for_import_path(&self, import_path: &str) -> Result<RepoPath> {
        let mut repo_path = match self.replacement_for(import_path) {
            Some(r) => r.clone(),
            None => self.resolver.resolve(import_path)?,
        };
        if repo_path.version.is_none() {
            repo_path.version = self.versions.get(&repo_path.root).cloned();
        }
        Ok(repo_path)
    }

    /// The replacement covering `import_path`, if any: the entry for the
    /// path itself or for its longest ancestor on segment boundaries.
    fn replacement_for(&self, import_path: &str) -> Option<&RepoPath> {
        let mut candidate = import_path;
        loop {
            if let Some(found) = self.replacements.get(candidate) {
                return Some(found);
            }
            candidate = candidate.rsplit_once('/')?.0;
        }
    }

    /// Search the tree for an import comment naming the top-level import
    /// path, then fall back to reading it off the filesystem path.
    fn find_import_path(&self) -> Result<String> {
        if let Some(found) = self.import_path_from_comments()? {
            return Ok(found);
        }
        import_path_from_filepath(&self.path).ok_or(Error::NeedImportPath)
    }

    /// Scan `.go` files (outside dot-directories and `vendor/`) for a
    /// `package p // import "path"` comment.
    fn import_path_from_comments(&self) -> Result<Option<String>> {
        let mut walker = WalkDir::new(&self.path).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && (name.starts_with('.') || name == "vendor") {
                    walker.skip_current_dir();
                }
                continue;
            }
            if !name.ends_with(".go") || !entry.file_type().is_file() {
                continue;
            }

            let content = std::fs::read_to_string(entry.path())
                .map_err(|e| Error::io(entry.path(), e))?;
            for line in content.lines() {
                if let Some(caps) = IMPORT_COMMENT_PATH.captures(line) {
                    return Ok(Some(caps[1].to_string()));
                }
            }
        }
        Ok(None)
    }
}

/// Derive an import path from a filesystem path: everything from the
/// rightmost domain-like component (one containing a dot) onwards.
pub fn import_path_from_filepath(path: &Path) -> Option<String> {
    let abs = std::path::absolute(path).ok()?;
    let components: Vec<String> = abs
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let start = components.iter().rposition(|c| c.contains('.'))?;
    Some(components[start..].join("/"))
}

/// True when `path` looks like a Go source tree: Go files at the top
/// level, a vendor subtree, or a recognized dependency manifest.
fn is_go_source_tree(path: &Path) -> bool {
    if path.join("vendor").is_dir()
        || path.join("Godeps").join("Godeps.json").is_file()
        || path.join("glide.yaml").is_file()
    {
        return true;
    }
    std::fs::read_dir(path).is_ok_and(|entries| {
        entries.flatten().any(|e| {
            e.file_name().to_string_lossy().ends_with(".go")
                && e.file_type().is_ok_and(|t| t.is_file())
        })
    })
}

/// Expand exclusion globs against the top-level entries of `dir`. Each
/// glob matches entry names, not full paths; matching entries join the
/// exclude set as `dir/<entry>`.
pub fn find_excludes(dir: &Path, globs: &[String]) -> Result<BTreeSet<PathBuf>> {
    let mut excludes = BTreeSet::new();
    if globs.is_empty() {
        return Ok(excludes);
    }

    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(
            Glob::new(glob).map_err(|e| Error::Parse(format!("glob {glob:?}: {e}")))?,
        );
    }
    let set = builder
        .build()
        .map_err(|e| Error::Parse(format!("exclusion globs: {e}")))?;

    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if set.is_match(Path::new(&entry.file_name())) {
            excludes.insert(dir.join(entry.file_name()));
        }
    }
    Ok(excludes)
}

/// Find Go source trees at `path`: the path itself when it is one, or
/// else its immediate subdirectories, for repositories that are
/// collections of independently-vendored projects.
pub fn find_go_sources(path: &Path, exclude_globs: &[String]) -> Result<Vec<GoSource>> {
    if let Ok(src) = GoSource::new(path, exclude_globs) {
        return Ok(vec![src]);
    }

    let mut sources = Vec::new();
    let entries = std::fs::read_dir(path).map_err(|e| Error::io(path, e))?;
    let mut subdirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();
    subdirs.sort();

    for subdir in subdirs {
        if let Ok(mut src) = GoSource::new(&subdir, exclude_globs) {
            src.sub_path = subdir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            sources.push(src);
        }
    }

    if sources.is_empty() {
        return Err(Error::NoSource(path.to_path_buf()));
    }
    Ok(sources)
}
