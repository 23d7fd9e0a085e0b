//! Semver tag handling and pseudo-version synthesis

use chrono::{DateTime, Utc};
use semver::Version;

use crate::error::{Error, Result};

/// Parse a repository tag as a semantic version.
///
/// Tags in the wild are sloppier than the semver grammar: a leading `v` or
/// `V` is common, and so are truncated cores like `1.2`. Both are accepted;
/// anything else unparseable yields `None`.
pub fn parse_tag(tag: &str) -> Option<Version> {
    let t = tag.trim();
    let t = t
        .strip_prefix('v')
        .or_else(|| t.strip_prefix('V'))
        .unwrap_or(t);
    if t.is_empty() {
        return None;
    }

    let core_end = t.find(['-', '+']).unwrap_or(t.len());
    let (core, rest) = t.split_at(core_end);
    let padded = match core.bytes().filter(|&b| b == b'.').count() {
        0 => format!("{core}.0.0{rest}"),
        1 => format!("{core}.0{rest}"),
        _ => t.to_string(),
    };

    Version::parse(&padded).ok()
}

/// Keep only semver-parseable tags, sorted newest first by semver ordering.
/// The original tag strings are preserved (pre-release suffixes included).
pub fn sort_tags_newest_first(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut parsed: Vec<(Version, String)> = tags
        .into_iter()
        .filter_map(|tag| parse_tag(&tag).map(|v| (v, tag)))
        .collect();
    parsed.sort_by(|a, b| b.0.cmp(&a.0));
    parsed.into_iter().map(|(_, tag)| tag).collect()
}

/// The narrow capability set needed to synthesize a pseudo-version, carved
/// out of the working-tree interface so tests can substitute a fake without
/// standing up a real checkout.
pub trait Describable {
    /// The most recent semver-like tag reachable from `rev`, or
    /// [`Error::VersionNotFound`] when the ancestry holds none.
    fn reachable_tag(&self, rev: &str) -> Result<String>;

    /// The committer timestamp of `rev`.
    fn time_from_revision(&self, rev: &str) -> Result<DateTime<Utc>>;
}

/// Synthesize a version label for a commit with no exactly-matching tag.
///
/// The label sorts correctly against neighbouring tags: a commit after tag
/// `v1.2.0` becomes `v1.2.1-0.<timestamp>-<rev[:12]>` (before the next
/// patch), a commit after a pre-release keeps the pre-release and appends
/// `.0.`, and a commit with no reachable tag counts up from `v0.0.0`.
pub fn pseudo_version<D: Describable + ?Sized>(d: &D, rev: &str) -> Result<String> {
    // This commit is *before* some other tag
    let mut suffix = "-0.";
    let version = match d.reachable_tag(rev) {
        Err(Error::VersionNotFound) => "v0.0.0".to_string(),
        Err(e) => return Err(e),
        Ok(reachable) => match parse_tag(&reachable) {
            None => {
                // Not a semantic version. Use a suffix indicating this
                // commit is *after* the tag
                suffix = "-1.";
                reachable
            }
            Some(mut ver) => {
                if ver.pre.is_empty() {
                    ver.patch += 1;
                } else {
                    suffix = ".0.";
                }
                format!("v{ver}")
            }
        },
    };

    let t = d.time_from_revision(rev)?;
    let timestamp = t.with_timezone(&Utc).format("%Y%m%d%H%M%S");
    let short = if rev.len() > 12 { &rev[..12] } else { rev };
    Ok(format!("{version}{suffix}{timestamp}-{short}"))
}
