//! Candidate enumeration under an origin directory

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// All regular files under `origin`, sorted by path
///
/// With `recursive == false` only the top level of `origin` is listed.
/// Unreadable subdirectories are logged and skipped; an unreadable or
/// missing `origin` is an error.
pub fn collect_files(origin: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(origin)?;
    if !metadata.is_dir() {
        return Err(Error::Config(format!(
            "Origin is not a directory: {}",
            origin.display()
        )));
    }

    let mut walker = WalkDir::new(origin).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(?origin, error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.path().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!(?origin, count = files.len(), recursive, "Collected files");
    Ok(files)
}

/// Drop repeated origins, keeping first-seen order
pub fn dedupe_origins(origins: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    origins
        .iter()
        .filter(|origin| seen.insert(origin.as_path()))
        .cloned()
        .collect()
}
