//! Name collision resolution
//!
//! A destination name is claimed by creating it with `create_new` (O_EXCL),
//! so two workers, or two processes, can never be handed the same path.
//! Taken names get a numeric suffix: `IMG_0001.JPG`, `IMG_0001_1.JPG`,
//! `IMG_0001_2.JPG`, ...

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Highest numeric suffix tried before giving up
const MAX_SUFFIX: u32 = 9999;

/// `<stem>_<n><ext>`, or the name itself for `n == 0`
pub fn candidate_name(filename: &OsStr, n: u32) -> OsString {
    if n == 0 {
        return filename.to_os_string();
    }

    let base = Path::new(filename);
    let mut name = base
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| filename.to_os_string());
    name.push(format!("_{n}"));
    if let Some(ext) = base.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// An exclusively created, still empty destination file
///
/// Dropping an uncommitted reservation removes the placeholder again.
#[derive(Debug)]
pub struct Reservation {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl Reservation {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the open handle to write into the reserved file
    pub fn take_file(&mut self) -> Option<File> {
        self.file.take()
    }

    /// Close the handle, e.g. before renaming over the placeholder
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Keep the file and return its path
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        self.file = None;
        std::mem::take(&mut self.path)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file = None;
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = ?self.path, error = %e, "Failed to release reserved name");
        }
    }
}

/// Claim the first free name for `filename` inside `directory`
pub fn reserve(directory: &Path, filename: &OsStr) -> Result<Reservation> {
    for n in 0..=MAX_SUFFIX {
        let path = directory.join(candidate_name(filename, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                if n > 0 {
                    trace!(?path, attempts = n, "Resolved name collision");
                }
                return Ok(Reservation {
                    path,
                    file: Some(file),
                    committed: false,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::NameExhausted {
        directory: directory.to_path_buf(),
        filename: filename.to_string_lossy().into_owned(),
    })
}
