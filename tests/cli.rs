//! Integration tests for the CLI

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use common::{fixture, git_stdout, write, BAR_V2};

fn vendor_trace() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("vendor-trace"))
}

#[test]
fn test_cli_version() {
    vendor_trace()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vendor-trace"));
}

#[test]
fn test_cli_help() {
    vendor_trace()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trace vendored Go dependencies"))
        .stdout(predicate::str::contains("--import-path"))
        .stdout(predicate::str::contains("--exclude-from"))
        .stdout(predicate::str::contains("--diff"));
}

#[test]
fn test_cli_requires_path() {
    vendor_trace().assert().failure();
}

#[test]
fn test_no_source_exit_code() {
    let tmp = TempDir::new().unwrap();
    vendor_trace()
        .arg(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no Go source code found"));
}

#[test]
fn test_identifies_top_level_and_vendored() {
    let fx = fixture();
    vendor_trace()
        .arg(&fx.src_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("*example.com/top:v0.1.0"))
        .stdout(predicate::str::contains("example.com/foo/bar:v1.2.0"));
}

#[test]
fn test_unidentified_dependency_exits_1() {
    let fx = fixture();
    write(
        &fx.src_dir,
        "vendor/example.com/foo/bar/bar.go",
        "package bar\n\n// local fork, matches nothing upstream\n",
    );

    vendor_trace()
        .arg(&fx.src_dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("example.com/foo/bar ?"))
        .stderr(predicate::str::contains("not all versions identified"));
}

#[test]
fn test_pseudo_version_for_untagged_revision() {
    let fx = fixture();
    write(&fx.src_dir, "vendor/example.com/foo/bar/bar.go", BAR_V2);

    let head = git_stdout(&fx.bar_repo, &["rev-parse", "HEAD"]);
    let expected = format!("example.com/foo/bar:v1.2.1-0.20060102150405-{}", &head[..12]);

    vendor_trace()
        .arg(&fx.src_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_no_deps_flag() {
    let fx = fixture();
    vendor_trace()
        .arg("--no-deps")
        .arg(&fx.src_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("*example.com/top:v0.1.0"))
        .stdout(predicate::str::contains("foo/bar").not());
}

#[test]
fn test_only_prefix_filters_dependencies() {
    let fx = fixture();
    vendor_trace()
        .args(["--only", "github.com/"])
        .arg(&fx.src_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("foo/bar").not());
}

#[test]
fn test_json_output() {
    let fx = fixture();
    let output = vendor_trace()
        .args(["--format", "json"])
        .arg(&fx.src_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let doc: serde_json::Value = serde_json::from_slice(&output).expect("parse report");
    let entries = doc.as_array().expect("array report");
    assert_eq!(entries.len(), 2);

    let top = &entries[0];
    assert_eq!(top.get("top_level").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        top.get("pkg").and_then(|v| v.as_str()),
        Some("example.com/top")
    );
    assert_eq!(top.get("tag").and_then(|v| v.as_str()), Some("v0.1.0"));

    let dep = &entries[1];
    assert_eq!(dep.get("top_level").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(dep.get("identified").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(dep.get("ver").and_then(|v| v.as_str()), Some("v1.2.0"));
    assert_eq!(
        dep.get("rev").and_then(|v| v.as_str()).map(str::len),
        Some(40)
    );
}

#[test]
fn test_diff_changes_exit_code() {
    // The vendored copy lacks extra.go, which exists upstream at the
    // matched tag: still a subset match, but --diff reports the gap.
    let fx = fixture();
    vendor_trace()
        .arg("--diff")
        .arg(&fx.src_dir)
        .assert()
        .code(4)
        .stdout(predicate::str::contains("-package bar"));
}

#[test]
fn test_exclude_from_file() {
    let fx = fixture();
    // An unrelated scratch directory breaks the top-level match unless it
    // is excluded; the exclusion file lives outside the tree.
    write(&fx.src_dir, "scratch/notes.go", "package notes\n");
    let exclude_file = fx.tmp.path().join("excludes.txt");
    fs::write(&exclude_file, "# scratch files\nscratch\n").unwrap();

    vendor_trace()
        .arg(&fx.src_dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("*example.com/top ?"));

    vendor_trace()
        .arg("--exclude-from")
        .arg(&exclude_file)
        .arg(&fx.src_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("*example.com/top:v0.1.0"));
}
