//! Dependency-manager manifest detection
//!
//! The identification engine does not interpret dependency managers beyond
//! what helps it match: whether godep rewrote the vendored files, what the
//! top-level package calls itself, which versions were pinned, and which
//! repositories were replaced. Manifests that cannot be parsed are logged
//! and otherwise ignored: identification works without the extra hints,
//! just more slowly.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::resolver::RepoPath;
use crate::vcs::VcsKind;

/// The hints a source tree's manifests provide.
#[derive(Default)]
pub struct ManifestInfo {
    /// The top-level import path, when a manifest declares it.
    pub package: Option<String>,

    /// Whether godep manages the vendor tree (its vendoring strips import
    /// comments, which the matcher must tolerate).
    pub uses_godep: bool,

    /// Pinned revisions or versions, keyed by import path.
    pub versions: HashMap<String, String>,

    /// Repository replacements, keyed by import path.
    pub replacements: HashMap<String, RepoPath>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Godeps {
    import_path: Option<String>,
    #[serde(default)]
    deps: Vec<GodepsDep>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GodepsDep {
    import_path: String,
    rev: Option<String>,
}

#[derive(Deserialize)]
struct GlideYaml {
    package: Option<String>,
    #[serde(default, rename = "import")]
    imports: Vec<GlideImport>,
}

#[derive(Deserialize)]
struct GlideImport {
    package: String,
    repo: Option<String>,
    vcs: Option<String>,
}

#[derive(Deserialize)]
struct GlideLock {
    #[serde(default)]
    imports: Vec<GlideLockImport>,
}

#[derive(Deserialize)]
struct GlideLockImport {
    name: String,
    version: Option<String>,
}

/// Collect manifest hints from the tree at `path`.
pub fn detect(path: &Path) -> Result<ManifestInfo> {
    let mut info = ManifestInfo::default();
    read_godeps(path, &mut info)?;
    read_glide(path, &mut info)?;
    Ok(info)
}

fn read_godeps(path: &Path, info: &mut ManifestInfo) -> Result<()> {
    let manifest = path.join("Godeps").join("Godeps.json");
    let content = match std::fs::read_to_string(&manifest) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(manifest, e)),
    };
    // Presence alone marks the tree as godep-managed
    info.uses_godep = true;

    let godeps: Godeps = match serde_json::from_str(&content) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!("ignoring unparseable {}: {e}", manifest.display());
            return Ok(());
        }
    };
    info.package = godeps.import_path;
    for dep in godeps.deps {
        if let Some(rev) = dep.rev {
            info.versions.insert(dep.import_path, rev);
        }
    }
    Ok(())
}

fn read_glide(path: &Path, info: &mut ManifestInfo) -> Result<()> {
    let yaml = path.join("glide.yaml");
    if let Some(content) = read_optional(&yaml)? {
        match serde_yaml::from_str::<GlideYaml>(&content) {
            Ok(glide) => {
                if info.package.is_none() {
                    info.package = glide.package;
                }
                for import in glide.imports {
                    let Some(repo) = import.repo else { continue };
                    let vcs = match import.vcs.as_deref() {
                        Some(name) => VcsKind::from_name(name)?,
                        None => VcsKind::Git,
                    };
                    info.replacements
                        .insert(import.package.clone(), RepoPath::new(import.package, repo, vcs));
                }
            }
            Err(e) => tracing::warn!("ignoring unparseable {}: {e}", yaml.display()),
        }
    }

    let lock = path.join("glide.lock");
    if let Some(content) = read_optional(&lock)? {
        match serde_yaml::from_str::<GlideLock>(&content) {
            Ok(glide) => {
                for import in glide.imports {
                    if let Some(version) = import.version {
                        info.versions.entry(import.name).or_insert(version);
                    }
                }
            }
            Err(e) => tracing::warn!("ignoring unparseable {}: {e}", lock.display()),
        }
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}
