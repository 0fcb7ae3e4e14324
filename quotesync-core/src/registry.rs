//! The symbol registry: a newline-delimited ticker list on disk.
//!
//! Blank lines are ignored on load; every rewrite goes out sorted and
//! deduplicated.

use crate::source::SyncError;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Load the registry, skipping blank lines.
pub fn load(path: &Path) -> Result<Vec<String>, SyncError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| SyncError::Registry(format!("read {}: {e}", path.display())))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn save(path: &Path, symbols: &BTreeSet<String>) -> Result<(), SyncError> {
    let mut contents = symbols.iter().cloned().collect::<Vec<_>>().join("\n");
    contents.push('\n');
    fs::write(path, contents)
        .map_err(|e| SyncError::Registry(format!("write {}: {e}", path.display())))
}

/// Add symbols to the registry, returning only the genuinely new ones.
///
/// Already-present symbols are skipped; the file is rewritten sorted and
/// deduplicated either way.
pub fn add(path: &Path, symbols: &[String]) -> Result<Vec<String>, SyncError> {
    let mut all: BTreeSet<String> = load(path)?.into_iter().collect();
    let new: Vec<String> = symbols
        .iter()
        .filter(|s| !s.is_empty() && !all.contains(*s))
        .cloned()
        .collect();
    all.extend(new.iter().cloned());
    save(path, &all)?;
    Ok(new)
}

/// Remove symbols from the registry. Symbols not present are ignored.
pub fn remove(path: &Path, symbols: &[String]) -> Result<(), SyncError> {
    let mut all: BTreeSet<String> = load(path)?.into_iter().collect();
    for s in symbols {
        all.remove(s);
    }
    save(path, &all)
}
