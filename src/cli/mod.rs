//! Command-line interface for vendor-trace
//!
//! One project per line: `*<root>:<version>` for the top-level project,
//! `<root>:<version>` per vendored dependency, `<root> ?` when nothing
//! matched. The exit code distinguishes full success, partial
//! identification, a path holding no Go source, and diff output present.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::describe::Reference;
use crate::error::Error;
use crate::resolver::RepoPath;
use crate::source::{find_go_sources, GoSource};
use crate::vcs::new_working_tree;

pub const EXIT_OK: i32 = 0;
/// At least one project could not be identified.
pub const EXIT_UNIDENTIFIED: i32 = 1;
/// The supplied path holds no Go source.
pub const EXIT_NO_SOURCE: i32 = 2;
/// `--diff` produced output.
pub const EXIT_DIFF_CHANGES: i32 = 4;

/// Trace vendored Go dependencies back to their upstream versions
#[derive(Parser)]
#[command(name = "vendor-trace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Import path of the top-level project, when it cannot be inferred
    #[arg(short = 'i', long, value_name = "IMPORT_PATH")]
    import_path: Option<String>,

    /// Do not describe vendored dependencies
    #[arg(long)]
    no_deps: bool,

    /// Only report vendored projects whose import path starts with PREFIX
    #[arg(long, value_name = "PREFIX")]
    only: Option<String>,

    /// Ignore top-level directory entries matching globs from FILE
    #[arg(long, value_name = "FILE")]
    exclude_from: Option<PathBuf>,

    /// Show unified diffs against the identified upstream refs
    #[arg(long)]
    diff: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long)]
    verbose: bool,

    /// Path of the Go source tree to inspect
    path: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct ReportEntry {
    top_level: bool,
    identified: bool,
    #[serde(flatten)]
    reference: Reference,
}

/// Collects per-project outcomes and renders them in the chosen format.
struct Report {
    format: Format,
    entries: Vec<ReportEntry>,
    any_unidentified: bool,
    any_diff_changes: bool,
}

impl Report {
    fn new(format: Format) -> Self {
        Report {
            format,
            entries: Vec::new(),
            any_unidentified: false,
            any_diff_changes: false,
        }
    }

    fn identified(&mut self, top_level: bool, reference: Reference) {
        if self.format == Format::Text {
            let marker = if top_level { "*" } else { "" };
            println!("{marker}{}:{}", reference.pkg, reference.ver);
        }
        self.entries.push(ReportEntry {
            top_level,
            identified: true,
            reference,
        });
    }

    fn unidentified(&mut self, top_level: bool, project: &RepoPath) {
        if self.format == Format::Text {
            let marker = if top_level { "*" } else { "" };
            println!("{marker}{} ?", project.root);
        }
        if !self.any_unidentified {
            self.any_unidentified = true;
            eprintln!("error: not all versions identified");
        }
        self.entries.push(ReportEntry {
            top_level,
            identified: false,
            reference: Reference {
                pkg: project.root.clone(),
                repo: project.repo.clone(),
                ..Reference::default()
            },
        });
    }

    fn finish(self) -> Result<i32> {
        if self.format == Format::Json {
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &self.entries)
                .context("writing JSON report")?;
            println!();
        }

        Ok(if self.any_unidentified {
            EXIT_UNIDENTIFIED
        } else if self.any_diff_changes {
            EXIT_DIFF_CHANGES
        } else {
            EXIT_OK
        })
    }
}

pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Wire the verbose flag to the tracing log level. RUST_LOG in the
    // environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let exclude_globs = match &cli.exclude_from {
        Some(file) => read_exclude_file(file)?,
        None => Vec::new(),
    };

    let sources = match find_go_sources(&cli.path, &exclude_globs) {
        Ok(sources) => sources,
        Err(Error::NoSource(path)) => {
            eprintln!("error: no Go source code found at {}", path.display());
            return Ok(EXIT_NO_SOURCE);
        }
        Err(e) => return Err(e.into()),
    };

    let mut report = Report::new(cli.format);
    for src in &sources {
        inspect_source(&cli, src, &mut report)?;
    }
    report.finish()
}

/// Each line of the exclusion file is one glob; blank lines and `#`
/// comments are skipped.
fn read_exclude_file(file: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading exclusions from {}", file.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn inspect_source(cli: &Cli, src: &GoSource, report: &mut Report) -> Result<()> {
    let top = src
        .project(cli.import_path.as_deref())
        .with_context(|| format!("top-level project at {}", src.path.display()))?;
    identify(cli, src, &top, &src.path, true, report).with_context(|| top.root.clone())?;

    if cli.no_deps {
        return Ok(());
    }

    for (root, project) in src.vendored_projects()? {
        if let Some(prefix) = &cli.only {
            if !root.starts_with(prefix.as_str()) {
                continue;
            }
        }
        let dir = src.vendored_dir(&project);
        identify(cli, src, &project, &dir, false, report).with_context(|| root)?;
    }
    Ok(())
}

/// Identify one project, reusing a single upstream checkout for the match
/// and the optional diff. The checkout is released on every path out.
fn identify(
    cli: &Cli,
    src: &GoSource,
    project: &RepoPath,
    dir: &Path,
    top_level: bool,
    report: &mut Report,
) -> Result<()> {
    let mut wt = new_working_tree(project)?;
    let outcome = (|| -> crate::error::Result<()> {
        match src.describe_with_tree(project, &*wt, dir) {
            Ok(reference) => {
                if cli.diff {
                    let ref_name = if reference.tag.is_empty() {
                        &reference.rev
                    } else {
                        &reference.tag
                    };
                    let mut stdout = std::io::stdout();
                    if src.diff(project, &*wt, &mut stdout, dir, ref_name)? {
                        report.any_diff_changes = true;
                    }
                    stdout.flush().map_err(|e| Error::io(dir, e))?;
                }
                report.identified(top_level, reference);
            }
            Err(Error::VersionNotFound) => report.unidentified(top_level, project),
            Err(e) => return Err(e),
        }
        Ok(())
    })();

    let closed = wt.close();
    outcome?;
    closed?;
    Ok(())
}
