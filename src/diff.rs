//! Diffing local trees against upstream refs

use std::io::Write;
use std::path::Path;

use crate::describe::join_slash;
use crate::error::Result;
use crate::filehashes::FileHashes;
use crate::resolver::RepoPath;
use crate::source::GoSource;
use crate::vcs::WorkingTree;

impl GoSource {
    /// Write a unified diff between the local project files in `dir` and
    /// the upstream checkout at `ref_name`, across the union of both file
    /// sets; a path missing on either side diffs against the empty file.
    /// Returns whether any change exists.
    pub fn diff(
        &self,
        project: &RepoPath,
        wt: &dyn WorkingTree,
        sink: &mut dyn Write,
        dir: &Path,
        ref_name: &str,
    ) -> Result<bool> {
        let mut excludes = self.excludes().clone();
        excludes.insert(dir.join("vendor"));

        let mut local = FileHashes::new_from_tree(wt.hasher(), dir, &excludes)?;
        local.retain(|path| !path.starts_with('.'));

        let upstream = wt.file_hashes_from_ref(ref_name, &project.sub_path)?;
        // the per-file diffs read checkout files, so sync first
        wt.rev_sync(ref_name)?;

        let union: std::collections::BTreeSet<&str> =
            local.paths().chain(upstream.paths()).collect();

        let mut changed = false;
        for path in union {
            if let (Some(a), Some(b)) = (local.get(path), upstream.get(path)) {
                if a == b {
                    continue;
                }
            }
            let local_side = dir.join(path.replace('/', std::path::MAIN_SEPARATOR_STR));
            let checkout_rel = join_slash(&project.sub_path, path);
            if wt.diff(sink, &local_side, &checkout_rel)? {
                changed = true;
            }
        }

        Ok(changed)
    }
}
