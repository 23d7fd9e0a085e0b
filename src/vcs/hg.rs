//! The mercurial working-tree backend
//!
//! Queries go through `hg log --template xml`; only the `node` attribute
//! and the `<tag>`/`<date>` elements are consumed, so the output is
//! extracted with anchored patterns rather than a full XML parser.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::filehashes::FileHashes;
use crate::hash::{hasher_for, Hasher};
use crate::version::{parse_tag, sort_tags_newest_first, Describable};

use super::{Checkout, VcsKind, WorkingTree};

static LOG_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<logentry\b[^>]*\bnode="([0-9a-f]+)"[^>]*>(.*?)</logentry>"#)
        .expect("logentry pattern")
});
static TAG_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<tag>([^<]*)</tag>").expect("tag pattern"));
static DATE_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<date>([^<]*)</date>").expect("date pattern"));

#[derive(Debug, PartialEq, Eq)]
struct LogEntry {
    node: String,
    tag: Option<String>,
    date: Option<String>,
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_log_entries(xml: &str) -> Vec<LogEntry> {
    LOG_ENTRY
        .captures_iter(xml)
        .map(|caps| {
            let body = caps.get(2).expect("entry body").as_str();
            LogEntry {
                node: caps[1].to_string(),
                tag: TAG_ELEMENT
                    .captures(body)
                    .map(|t| xml_unescape(&t[1])),
                date: DATE_ELEMENT.captures(body).map(|d| d[1].to_string()),
            }
        })
        .collect()
}

/// The first entry whose tag parses as a semver, else the first entry.
fn pick_semver_entry(entries: &[LogEntry]) -> Option<&LogEntry> {
    entries
        .iter()
        .find(|e| e.tag.as_deref().is_some_and(|t| parse_tag(t).is_some()))
        .or_else(|| entries.first())
}

/// `hg tags` lines are `<name>  <rev>:<node>`; the name may itself contain
/// whitespace, so the last field is stripped instead of the first taken.
fn parse_tag_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let name = line.rsplit_once(char::is_whitespace)?.0.trim_end();
            if name.is_empty() || name == "tip" {
                return None;
            }
            Some(name.to_string())
        })
        .collect()
}

pub struct HgWorkingTree {
    checkout: Checkout,
}

impl HgWorkingTree {
    /// Clone `repo` into a fresh temporary checkout.
    pub fn create(repo: &str) -> Result<Self> {
        Ok(HgWorkingTree {
            checkout: Checkout::create(VcsKind::Hg, repo)?,
        })
    }

    /// Run `hg log --template xml` with extra `args` and return the
    /// entries. With a non-zero `expect`, a different entry count is an
    /// error.
    fn log(&self, args: &[&str], expect: usize) -> Result<Vec<LogEntry>> {
        let mut log_args = vec!["log", "--encoding", "utf-8", "--template", "xml"];
        log_args.extend_from_slice(args);
        let stdout = self.checkout.run_ok(&log_args)?;
        let entries = parse_log_entries(&stdout);
        if expect != 0 && entries.len() != expect {
            return Err(Error::Parse(format!(
                "hg {}: {} logentry elements (expected {expect})",
                log_args.join(" "),
                entries.len()
            )));
        }
        Ok(entries)
    }
}

impl Describable for HgWorkingTree {
    /// The most recent reachable semver-like tag, via
    /// `hg log -r "ancestors(...) & tag(...)"`.
    fn reachable_tag(&self, rev: &str) -> Result<String> {
        // Up to 10 reachable tags that might be semver tags
        let revset = format!("ancestors({rev}) & tag(r're:v?[0-9]')");
        let entries = self.log(&["-r", &revset, "--limit", "10"], 0)?;

        pick_semver_entry(&entries)
            .and_then(|e| e.tag.clone())
            .ok_or(Error::VersionNotFound)
    }

    fn time_from_revision(&self, rev: &str) -> Result<DateTime<Utc>> {
        let entries = self.log(&["-r", rev], 1)?;
        let date = entries[0]
            .date
            .as_deref()
            .ok_or_else(|| Error::Parse(format!("no date for {rev}")))?;
        let instant = DateTime::parse_from_rfc3339(date)
            .map_err(|e| Error::Parse(format!("commit time {date:?}: {e}")))?;
        Ok(instant.with_timezone(&Utc))
    }
}

impl WorkingTree for HgWorkingTree {
    fn kind(&self) -> VcsKind {
        VcsKind::Hg
    }

    fn root(&self) -> &Path {
        self.checkout.path()
    }

    fn hasher(&self) -> Arc<dyn Hasher> {
        hasher_for(VcsKind::Hg)
    }

    fn version_tags(&self) -> Result<Vec<String>> {
        let stdout = self.checkout.run_ok(&["tags"])?;
        Ok(sort_tags_newest_first(parse_tag_lines(&stdout)))
    }

    fn revisions(&self) -> Result<Vec<String>> {
        Ok(self.log(&[], 0)?.into_iter().map(|e| e.node).collect())
    }

    fn rev_sync(&self, rev: &str) -> Result<()> {
        self.checkout.run_ok(&["update", "-r", rev])?;
        Ok(())
    }

    fn revision_from_tag(&self, tag: &str) -> Result<String> {
        let revset = format!("tag({tag})");
        let entries = self.log(&["-r", &revset], 1)?;
        Ok(entries[0].node.clone())
    }

    /// Materialize `ref_name` with `hg archive` and hash the result with
    /// the generic hasher; mercurial has no cheap per-ref object listing.
    fn file_hashes_from_ref(&self, ref_name: &str, sub_path: &str) -> Result<FileHashes> {
        let dir = TempDir::with_prefix("vendor-trace.")
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let dir_str = dir.path().to_string_lossy().into_owned();
        self.checkout
            .run_ok(&["archive", "-r", ref_name, "--type", "files", dir_str.as_str()])?;

        // hg drops a .hg_archival.txt marker into the archive; it cannot
        // exist locally, and subset matching ignores upstream extras
        let root = if sub_path.is_empty() {
            dir.path().to_path_buf()
        } else {
            dir.path().join(sub_path)
        };
        FileHashes::new_from_tree(self.hasher(), &root, &Default::default())
    }

    fn close(&mut self) -> Result<()> {
        self.checkout.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<log>
<logentry revision="2" node="aaaa000011112222333344445555666677778888">
<tag>tip</tag>
<author email="t@example.com">t</author>
<date>2006-01-02T15:04:05+00:00</date>
<msg xml:space="preserve">third</msg>
</logentry>
<logentry revision="1" node="bbbb000011112222333344445555666677778888">
<tag>v1.0.0</tag>
<date>2006-01-01T00:00:00+00:00</date>
<msg xml:space="preserve">second</msg>
</logentry>
<logentry revision="0" node="cccc000011112222333344445555666677778888">
<date>2005-12-31T00:00:00+00:00</date>
<msg xml:space="preserve">first</msg>
</logentry>
</log>
"#;

    #[test]
    fn test_parse_log_entries() {
        let entries = parse_log_entries(SAMPLE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].node, "aaaa000011112222333344445555666677778888");
        assert_eq!(entries[0].tag.as_deref(), Some("tip"));
        assert_eq!(entries[1].tag.as_deref(), Some("v1.0.0"));
        assert_eq!(entries[2].tag, None);
        assert_eq!(
            entries[2].date.as_deref(),
            Some("2005-12-31T00:00:00+00:00")
        );
    }

    #[test]
    fn test_pick_semver_entry_prefers_semver() {
        let entries = parse_log_entries(SAMPLE);
        let picked = pick_semver_entry(&entries).unwrap();
        assert_eq!(picked.tag.as_deref(), Some("v1.0.0"));
    }

    #[test]
    fn test_pick_semver_entry_falls_back_to_first() {
        let entries = vec![
            LogEntry {
                node: "a".into(),
                tag: Some("release-one".into()),
                date: None,
            },
            LogEntry {
                node: "b".into(),
                tag: Some("release-two".into()),
                date: None,
            },
        ];
        let picked = pick_semver_entry(&entries).unwrap();
        assert_eq!(picked.tag.as_deref(), Some("release-one"));
    }

    #[test]
    fn test_pick_semver_entry_empty() {
        assert!(pick_semver_entry(&[]).is_none());
    }

    #[test]
    fn test_parse_tag_lines() {
        let stdout = "tip                                3:aaaa0000\nv1.1.0                             2:bbbb0000\nodd tag                            1:cccc0000\n";
        assert_eq!(parse_tag_lines(stdout), vec!["v1.1.0", "odd tag"]);
    }

    #[test]
    fn test_xml_unescape() {
        assert_eq!(xml_unescape("a &amp; b &lt;c&gt;"), "a & b <c>");
    }
}
