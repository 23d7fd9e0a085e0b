//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Content of the vendored package at tag v1.2.0.
pub const BAR_V1: &str = "package bar\n\nfunc Bar() {}\n";
/// Content of the vendored package at the untagged head revision.
pub const BAR_V2: &str = "package bar\n\nfunc Bar() {}\n\nfunc Baz() {}\n";

/// Run git in `dir` with pinned identity and dates, so object ids and
/// commit timestamps are reproducible.
pub fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_AUTHOR_DATE", "2006-01-02T15:04:05Z")
        .env("GIT_COMMITTER_DATE", "2006-01-02T15:04:05Z")
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {args:?} in {}: {}",
        dir.display(),
        String::from_utf8_lossy(&out.stderr)
    );
}

pub fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(out.status.success(), "git {args:?}");
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let full = root.join(rel);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// A local Go source tree with one vendored dependency, and the upstream
/// repositories backing both the top-level project and the dependency.
/// glide.yaml repository replacements point every import path at the
/// local upstream repositories, so nothing touches the network.
pub struct Fixture {
    pub tmp: TempDir,
    /// The tree under inspection.
    pub src_dir: PathBuf,
    /// Upstream of `example.com/top`, tagged v0.1.0.
    pub top_repo: PathBuf,
    /// Upstream of `example.com/foo/bar`: v1.2.0 tags the first commit
    /// (BAR_V1 plus an extra file), the second commit (BAR_V2) is
    /// untagged.
    pub bar_repo: PathBuf,
}

pub fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    let top_repo = tmp.path().join("upstream-top");
    let bar_repo = tmp.path().join("upstream-bar");

    // Upstream of the vendored dependency
    fs::create_dir_all(&bar_repo).unwrap();
    git(&bar_repo, &["init", "-q", "-b", "main"]);
    write(&bar_repo, "bar.go", BAR_V1);
    write(&bar_repo, "extra.go", "package bar\n");
    git(&bar_repo, &["add", "."]);
    git(&bar_repo, &["commit", "-q", "-m", "first"]);
    git(&bar_repo, &["tag", "v1.2.0"]);
    write(&bar_repo, "bar.go", BAR_V2);
    git(&bar_repo, &["add", "."]);
    git(&bar_repo, &["commit", "-q", "-m", "second"]);

    // The local tree; glide.yaml wires import paths to the repositories
    // above
    let glide = format!(
        "package: example.com/top\nimport:\n- package: example.com/top\n  repo: {}\n- package: example.com/foo/bar\n  repo: {}\n",
        top_repo.display(),
        bar_repo.display()
    );
    write(&src_dir, "main.go", "package main\n\nfunc main() {}\n");
    write(&src_dir, "glide.yaml", &glide);
    write(&src_dir, "vendor/example.com/foo/bar/bar.go", BAR_V1);

    // Upstream of the top-level project holds identical copies of its
    // files
    fs::create_dir_all(&top_repo).unwrap();
    git(&top_repo, &["init", "-q", "-b", "main"]);
    fs::copy(src_dir.join("main.go"), top_repo.join("main.go")).unwrap();
    fs::copy(src_dir.join("glide.yaml"), top_repo.join("glide.yaml")).unwrap();
    git(&top_repo, &["add", "."]);
    git(&top_repo, &["commit", "-q", "-m", "release"]);
    git(&top_repo, &["tag", "v0.1.0"]);

    Fixture {
        tmp,
        src_dir,
        top_repo,
        bar_repo,
    }
}
