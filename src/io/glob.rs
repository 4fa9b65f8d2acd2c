//! Expansion of configured input entries into an ordered file list.
//!
//! An entry is either a plain path or a glob pattern (`data/2010_*.csv`,
//! `raw/**/*.csv.gz`). Entries keep their configured order; the files
//! matched by one pattern are sorted lexicographically so a run is
//! reproducible.

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// `true` if `entry` contains glob metacharacters.
#[must_use]
pub fn is_pattern(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

/// Expand a glob pattern into a sorted vector of matching files.
///
/// Directories are skipped. Zero matches yield an empty vector.
///
/// # Errors
/// Returns an error if the pattern is invalid or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Expand every input entry in order.
///
/// Plain paths are passed through untouched even if they do not exist yet;
/// opening them is the source's job and fails with the file named.
///
/// # Errors
/// Returns an error if a pattern is invalid or matches no file.
pub fn expand_inputs<S: AsRef<str>>(entries: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.as_ref();
        if is_pattern(entry) {
            let matched = expand_glob(entry)?;
            if matched.is_empty() {
                bail!("no files found matching pattern: {entry}");
            }
            files.extend(matched);
        } else {
            files.push(PathBuf::from(entry));
        }
    }
    Ok(files)
}
