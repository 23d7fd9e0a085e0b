//! Import-comment removal

use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::error::{Error, Result};

// package foo // import "example.com/foo"
// package foo /* import `example.com/foo` */ trailing
static IMPORT_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(package\s+\w+)\s+(?://\s*import\s+(?:"[^"]+"|`[^`]+`)\s*$|/\*\s*import\s+(?:"[^"]+"|`[^`]+`)\s*\*/)(.*)"#,
    )
    .expect("import comment pattern")
});

/// Remove an import comment from a line, if one is present.
fn remove_import_comment(line: &[u8]) -> Option<Vec<u8>> {
    IMPORT_COMMENT.captures(line).map(|caps| {
        let mut out = caps.get(1).expect("package group").as_bytes().to_vec();
        // anything after the first closing */
        out.extend_from_slice(caps.get(2).expect("trailing group").as_bytes());
        out
    })
}

/// Copy the Go source file at `path` to `sink` with import comments removed
/// from package declarations, the same way godep rewrites files at vendor
/// time. Returns whether the written content differs from the input; a
/// missing final newline also counts as a change (one is always written).
///
/// Non-`.go` files and missing files yield `false` and are not copied.
pub fn strip_import_comment(path: &Path, sink: &mut dyn Write) -> Result<bool> {
    if !path.extension().is_some_and(|ext| ext == "go") {
        return Ok(false);
    }
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(path, e)),
    };

    let mut changed = false;
    let mut rest: &[u8] = &data;
    while !rest.is_empty() {
        let (line, tail) = match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => {
                // There was no newline but we'll add one
                changed = true;
                (rest, &[][..])
            }
        };
        rest = tail;

        let replacement = remove_import_comment(line);
        if replacement.is_some() {
            changed = true;
        }
        let out = replacement.as_deref().unwrap_or(line);
        sink.write_all(out)
            .and_then(|()| sink.write_all(b"\n"))
            .map_err(|e| Error::io(path, e))?;
    }

    Ok(changed)
}
