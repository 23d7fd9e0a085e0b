//! Trace vendored Go dependencies back to their upstream versions.
//!
//! A Go source tree carries verbatim copies of its dependencies inside a
//! `vendor/` subtree, each at its upstream import path, but nothing in
//! the tree says which upstream version a copy was taken from. This crate
//! answers that question by reproducing upstream content hashes: it walks
//! the vendored files, hashes them the way the upstream version control
//! system would, and scans the upstream repository's tags and revisions
//! for a ref whose tree the local files are a subset of.
//!
//! A [`GoSource`] models the tree under inspection. Its
//! [`vendored_projects`] method discovers the vendored dependencies, and
//! [`describe_vendored_project`] identifies one of them, producing a
//! [`Reference`] carrying the matching tag or revision and a version
//! label. Commits with no exactly-matching tag get a pseudo-version
//! synthesized from the nearest reachable tag and the commit timestamp.
//!
//! ```no_run
//! use vendor_trace::GoSource;
//!
//! # fn main() -> vendor_trace::Result<()> {
//! let src = GoSource::new("./project", &[])?;
//! for (root, project) in src.vendored_projects()? {
//!     let reference = src.describe_vendored_project(&project)?;
//!     println!("{root}: {}", reference.ver);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`vendored_projects`]: GoSource::vendored_projects
//! [`describe_vendored_project`]: GoSource::describe_vendored_project

pub mod cli;
pub mod describe;
pub mod diff;
pub mod discover;
pub mod error;
pub mod filehashes;
pub mod hash;
pub mod manifest;
pub mod resolver;
pub mod source;
pub mod strip;
#[cfg(test)]
mod testutil;
pub mod vcs;
pub mod version;

pub use describe::Reference;
pub use error::{Error, Result};
pub use filehashes::FileHashes;
pub use hash::{FileHash, Hasher};
pub use resolver::{RepoPath, RepoPathResolver};
pub use source::{find_go_sources, GoSource};
pub use vcs::{new_working_tree, VcsKind, WorkingTree};
pub use version::{pseudo_version, Describable};
