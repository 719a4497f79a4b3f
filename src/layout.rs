//! Destination directory layout
//!
//! `<destination>/iPhone_Photos/<YYYY-MM>/` receives regular media, with
//! `RAW_Images/` for `.dng` and `ss_and_downloads/` for `.png` beneath it.

use crate::config::LayoutNames;
use crate::error::Result;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

/// Routing category, a pure function of the lowercased extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    /// RAW captures (`.dng`)
    Raw,
    /// Screenshots and saved images (`.png`)
    ScreenshotOrDownload,
    /// Everything else, stored directly in the month folder
    Media,
}

impl MediaCategory {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "dng" => MediaCategory::Raw,
            "png" => MediaCategory::ScreenshotOrDownload,
            _ => MediaCategory::Media,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(MediaCategory::Media)
    }
}

/// `YYYY-MM` partition key of a timestamp
pub fn partition_key(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m").to_string()
}

/// Maps (file name, timestamp, destination root) to a target directory
#[derive(Debug, Clone, Default)]
pub struct Layout {
    names: LayoutNames,
}

impl Layout {
    pub fn new(names: LayoutNames) -> Self {
        Self { names }
    }

    /// Compute the target directory without touching the filesystem
    pub fn directory_for(
        &self,
        filename: &str,
        timestamp: &NaiveDateTime,
        dest_root: &Path,
    ) -> PathBuf {
        let base = dest_root
            .join(&self.names.root_folder)
            .join(partition_key(timestamp));

        match MediaCategory::from_filename(filename) {
            MediaCategory::Raw => base.join(&self.names.raw_folder),
            MediaCategory::ScreenshotOrDownload => base.join(&self.names.screenshot_folder),
            MediaCategory::Media => base,
        }
    }

    /// Compute the target directory and make sure it exists
    ///
    /// Safe to call concurrently for the same directory: a directory that
    /// appears between the check and the create is not an error.
    pub fn map_destination(
        &self,
        filename: &str,
        timestamp: &NaiveDateTime,
        dest_root: &Path,
    ) -> Result<PathBuf> {
        let dir = self.directory_for(filename, timestamp, dest_root);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
