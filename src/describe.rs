//! Matching local trees against upstream refs

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::filehashes::FileHashes;
use crate::resolver::RepoPath;
use crate::source::GoSource;
use crate::vcs::{new_working_tree, WorkingTree};
use crate::version::{parse_tag, pseudo_version};

/// The origin of a project: which upstream tag or revision the local copy
/// of its source code was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Root import path of the package.
    pub pkg: String,

    /// URL of the repository holding the source code.
    pub repo: String,

    /// The semver tag corresponding exactly to the local copy, or `""`
    /// when no tag corresponds.
    pub tag: String,

    /// The upstream revision the local copy was taken from, or `""` when
    /// unknown.
    pub rev: String,

    /// The semantic version or pseudo-version for `rev`. Equal to `tag`
    /// when `tag` is set.
    pub ver: String,
}

/// Sync the tree to `ref_name` and re-hash the listed files after
/// stripping import comments the way godep does. Returns whether any hash
/// was modified. Lookups into `upstream` use the local relative path;
/// only checkout access is prefixed with `sub_path`.
fn update_hashes_after_strip(
    upstream: &mut FileHashes,
    wt: &dyn WorkingTree,
    ref_name: &str,
    sub_path: &str,
    paths: &[String],
) -> Result<bool> {
    wt.rev_sync(ref_name)?;

    let mut any_changed = false;
    for path in paths {
        let checkout_rel = join_slash(sub_path, path);
        let mut stripped = Vec::new();
        if !wt.strip_import_comment(&checkout_rel, &mut stripped)? {
            continue;
        }

        // Write the altered content out so the hasher can see a file
        let tmp = tempfile::Builder::new()
            .prefix("vendor-trace-strip.")
            .tempfile()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        std::fs::write(tmp.path(), &stripped).map_err(|e| Error::io(tmp.path(), e))?;

        let hash = upstream.hasher().hash(path, tmp.path())?;
        upstream.set(path.clone(), hash);
        any_changed = true;
    }

    Ok(any_changed)
}

pub(crate) fn join_slash(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}

/// Scan `refs` in order for those whose file hashes the local hashes are
/// a subset of, optionally tolerating stripped import comments. The scan
/// collects the first consecutive run of matches and stops at its end;
/// refs upstream cannot answer for are skipped. No match at all is
/// [`Error::VersionNotFound`].
fn match_from_refs(
    strip: bool,
    local: &FileHashes,
    wt: &dyn WorkingTree,
    sub_path: &str,
    refs: &[String],
) -> Result<Vec<String>> {
    let paths: Vec<String> = if strip {
        local.paths().map(str::to_string).collect()
    } else {
        Vec::new()
    };

    let match_from_ref = |upstream: &mut FileHashes, ref_name: &str| -> Result<bool> {
        if local.is_subset_of(upstream) {
            return Ok(true);
        }
        if !strip {
            return Ok(false);
        }
        if paths.iter().any(|p| !upstream.contains(p)) {
            // File missing from revision
            return Ok(false);
        }
        let changed = update_hashes_after_strip(upstream, wt, ref_name, sub_path, &paths)?;
        Ok(changed && local.is_subset_of(upstream))
    };

    let mut matches: Vec<String> = Vec::new();
    for ref_name in refs {
        tracing::debug!("{ref_name}: trying match");
        let mut upstream = match wt.file_hashes_from_ref(ref_name, sub_path) {
            Err(Error::InvalidRef) => continue,
            other => other?,
        };
        if match_from_ref(&mut upstream, ref_name)? {
            matches.push(ref_name.clone());
        } else if !matches.is_empty() {
            // This is the end of a matching run of refs
            break;
        }
    }

    if matches.is_empty() {
        return Err(Error::VersionNotFound);
    }
    Ok(matches)
}

/// From a run of matching tags (sorted newest first), the earliest tag
/// whose semver parse has no prerelease, or else the last tag overall.
fn choose_best_tag(tags: &[String]) -> String {
    for tag in tags.iter().rev() {
        if let Some(v) = parse_tag(tag) {
            if v.pre.is_empty() {
                tracing::debug!("best of {tags:?}: {tag} (no prerelease)");
                return tag.clone();
            }
        }
    }

    let tag = tags.last().expect("matching run is never empty");
    tracing::debug!("best of {tags:?}: {tag} (earliest)");
    tag.clone()
}

impl GoSource {
    /// Identify the upstream tag or revision corresponding to the project
    /// files in `dir`, by comparison with file hashes of upstream refs.
    /// Vendored files beneath `dir` and dot files are ignored.
    ///
    /// Creates (and always releases) an ephemeral upstream checkout.
    pub fn describe_project(&self, project: &RepoPath, dir: &Path) -> Result<Reference> {
        let mut wt = new_working_tree(project)?;
        let result = self.describe_with_tree(project, &*wt, dir);
        let closed = wt.close();
        let reference = result?;
        closed?;
        Ok(reference)
    }

    /// As [`describe_project`], against a caller-provided working tree.
    ///
    /// [`describe_project`]: GoSource::describe_project
    pub fn describe_with_tree(
        &self,
        project: &RepoPath,
        wt: &dyn WorkingTree,
        dir: &Path,
    ) -> Result<Reference> {
        // A private copy of the excludes; the vendored copies beneath the
        // project are someone else's code
        let mut excludes = self.excludes().clone();
        excludes.insert(dir.join("vendor"));

        let sub_path = project.sub_path.as_str();
        tracing::debug!(
            "describing {} against {}/{sub_path}",
            dir.display(),
            project.root
        );

        let mut local = FileHashes::new_from_tree(wt.hasher(), dir, &excludes)?;
        // Ignore dot files (e.g. .git)
        local.retain(|path| !path.starts_with('.'));
        if local.is_empty() {
            return Err(Error::NoFiles);
        }

        // godep strips import comments from the files it vendors, but the
        // top-level project's own files are untouched
        let strip = self.uses_godep && dir != self.path;

        let reference = |tag: &str, rev: String, ver: String| Reference {
            pkg: project.root.clone(),
            repo: project.repo.clone(),
            tag: tag.to_string(),
            rev,
            ver,
        };

        // First try matching against a pinned version, if there is one
        if let Some(version) = &project.version {
            match match_from_refs(strip, &local, wt, sub_path, std::slice::from_ref(version)) {
                Ok(matches) => {
                    let rev = matches.into_iter().next().expect("pinned match");
                    tracing::debug!("{rev}: matches dependency management version");
                    let ver = pseudo_version(wt, &rev)?;
                    return Ok(reference("", rev, ver));
                }
                // No match, carry on
                Err(Error::VersionNotFound) => {}
                Err(e) => return Err(e),
            }
        }

        // Second try matching against tags for semantic versions
        let tags = wt.version_tags()?;
        match match_from_refs(strip, &local, wt, sub_path, &tags) {
            Ok(matches) => {
                let tag = choose_best_tag(&matches);
                let rev = wt.revision_from_tag(&tag)?;
                let ver = tag.clone();
                return Ok(reference(&tag, rev, ver));
            }
            // No match, carry on
            Err(Error::VersionNotFound) => {}
            Err(e) => return Err(e),
        }

        // Third try each revision, newest first
        let revs = wt.revisions()?;
        let matches = match_from_refs(strip, &local, wt, sub_path, &revs)?;
        let rev = matches.into_iter().next().expect("matching run is never empty");
        let ver = pseudo_version(wt, &rev)?;
        Ok(reference("", rev, ver))
    }

    /// Identify the upstream version of a vendored copy of `project`.
    pub fn describe_vendored_project(&self, project: &RepoPath) -> Result<Reference> {
        let project_dir = self.vendored_dir(project);
        self.describe_project(project, &project_dir)
    }

    /// Where the vendored copy of `project` lives.
    pub fn vendored_dir(&self, project: &RepoPath) -> std::path::PathBuf {
        let mut dir = self.vendor();
        for segment in project.root.split('/') {
            dir.push(segment);
        }
        dir
    }
}
