//! Vendored-project discovery

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::resolver::RepoPath;
use crate::source::GoSource;

/// Walk state: the vendor directory, and the root of the last project
/// identified so the rest of its files are skipped.
struct VendoredSearch {
    vendor: PathBuf,
    lastdir: Option<PathBuf>,
    vendored: BTreeMap<String, RepoPath>,
}

impl VendoredSearch {
    fn in_last_dir(&self, path: &Path) -> bool {
        // Path::starts_with only matches on component boundaries
        self.lastdir
            .as_deref()
            .is_some_and(|last| path.starts_with(last))
    }

    fn process_source_file(&mut self, src: &GoSource, path: &Path) -> Result<()> {
        // The import path is the directory, relative to the vendor dir
        let rel = path
            .parent()
            .and_then(|dir| dir.strip_prefix(&self.vendor).ok())
            .ok_or_else(|| {
                Error::Parse(format!("{} is not vendored", path.display()))
            })?;
        let import_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let repo_path = src.repo_path_for_import_path(&import_path)?;
        self.lastdir = Some(self.vendor.join(repo_path.root.replace('/', std::path::MAIN_SEPARATOR_STR)));
        self.vendored.insert(repo_path.root.clone(), repo_path);
        Ok(())
    }
}

impl GoSource {
    /// Map each vendored project to its repository, keyed by root import
    /// path. A missing vendor subtree yields an empty map; it is not an
    /// error.
    pub fn vendored_projects(&self) -> Result<BTreeMap<String, RepoPath>> {
        let vendor = self.vendor();
        let mut search = VendoredSearch {
            vendor: vendor.clone(),
            lastdir: None,
            vendored: BTreeMap::new(),
        };

        if !vendor.is_dir() {
            return Ok(search.vendored);
        }

        for entry in WalkDir::new(&vendor).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                match e.into_io_error() {
                    Some(io) => Error::io(path, io),
                    None => Error::Parse("filesystem loop".to_string()),
                }
            })?;

            // Ignore paths within the last project identified
            if search.in_last_dir(entry.path()) {
                continue;
            }

            // Ignore anything except Go source
            if !entry.file_type().is_file()
                || !entry.file_name().to_string_lossy().ends_with(".go")
            {
                continue;
            }

            search.process_source_file(self, entry.path())?;
        }

        Ok(search.vendored)
    }
}
