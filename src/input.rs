//! Host input helpers: line reads from standard input and whole-file reads.
//!
//! Independent of the process plumbing; the embedding host calls these for
//! its own input handling. Both helpers expect UTF-8.

use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use crate::error::{CulvertError, Result};

/// Read one line from the host's standard input.
///
/// The trailing newline is stripped; interior content is untouched. Returns
/// `Ok(None)` at end-of-stream.
pub fn read_line() -> Result<Option<String>> {
    let stdin = io::stdin();
    read_line_from(&mut stdin.lock())
}

fn read_line_from<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).map_err(|source| CulvertError::Input {
        what: "standard input".to_string(),
        source,
    })?;
    if n == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(Some(line))
}

/// Read a whole file into a string, content returned as-is.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|source| CulvertError::Input {
        what: format!("file '{}'", path.display()),
        source,
    })
}
