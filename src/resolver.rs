//! Import path to repository resolution

use crate::error::{Error, Result};
use crate::vcs::VcsKind;

/// Where a package's repository lives: the repository-root import path,
/// the clone URL, the VCS in use, the sub-path from the repository root to
/// the package, and (when a manifest pins one) the version to try first.
#[derive(Debug, Clone)]
pub struct RepoPath {
    /// The repository-root prefix of the import path.
    pub root: String,

    /// The URL for the repository holding the source code.
    pub repo: String,

    pub vcs: VcsKind,

    /// Relative path from the repository root to the package, `""` when
    /// the package is the repository root.
    pub sub_path: String,

    /// A version pinned by dependency management, tried before tags.
    pub version: Option<String>,
}

impl RepoPath {
    pub fn new(root: impl Into<String>, repo: impl Into<String>, vcs: VcsKind) -> Self {
        RepoPath {
            root: root.into(),
            repo: repo.into(),
            vcs,
            sub_path: String::new(),
            version: None,
        }
    }
}

/// Maps an import path to the repository hosting it. Injected so the core
/// stays testable with a stub, and so callers can swap in a resolver that
/// performs live meta-import discovery.
pub trait RepoPathResolver: Send + Sync {
    fn resolve(&self, import_path: &str) -> Result<RepoPath>;
}

/// Static resolution for the hosts that account for almost all vendored
/// import paths. No network traffic; unknown dotted hosts fall back to
/// `https://<first-three-segments>` over git.
pub struct DefaultResolver;

impl RepoPathResolver for DefaultResolver {
    fn resolve(&self, import_path: &str) -> Result<RepoPath> {
        let segments: Vec<&str> = import_path.split('/').filter(|s| !s.is_empty()).collect();
        let host = *segments.first().ok_or(Error::NeedImportPath)?;

        match host {
            "github.com" | "gitlab.com" | "bitbucket.org" => {
                let root = root_of(&segments, 3, import_path)?;
                Ok(RepoPath::new(&root, format!("https://{root}"), VcsKind::Git))
            }
            "gopkg.in" => {
                // gopkg.in/pkg.v1 or gopkg.in/user/pkg.v1
                let depth = if segments.len() >= 3 && segments[1].contains(".v") {
                    2
                } else {
                    3.min(segments.len())
                };
                let root = root_of(&segments, depth, import_path)?;
                Ok(RepoPath::new(&root, format!("https://{root}"), VcsKind::Git))
            }
            "golang.org" => {
                if segments.len() < 3 || segments[1] != "x" {
                    return Err(unresolvable(import_path));
                }
                let root = segments[..3].join("/");
                Ok(RepoPath::new(
                    &root,
                    format!("https://go.googlesource.com/{}", segments[2]),
                    VcsKind::Git,
                ))
            }
            "k8s.io" => {
                let root = root_of(&segments, 2, import_path)?;
                Ok(RepoPath::new(
                    &root,
                    format!("https://github.com/kubernetes/{}", segments[1]),
                    VcsKind::Git,
                ))
            }
            _ if host.contains('.') => {
                let depth = 3.min(segments.len());
                let root = segments[..depth].join("/");
                Ok(RepoPath::new(&root, format!("https://{root}"), VcsKind::Git))
            }
            _ => Err(unresolvable(import_path)),
        }
    }
}

fn unresolvable(import_path: &str) -> Error {
    Error::Parse(format!(
        "cannot determine repository root for {import_path}"
    ))
}

fn root_of(segments: &[&str], depth: usize, import_path: &str) -> Result<String> {
    if segments.len() < depth {
        return Err(unresolvable(import_path));
    }
    Ok(segments[..depth].join("/"))
}
