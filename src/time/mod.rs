//! Capture time resolution
//!
//! A file's timestamp comes from an ordered chain of strategies; the first
//! one that yields a value wins:
//! 1. Embedded capture metadata (EXIF `DateTimeOriginal`)
//! 2. Timestamp patterns in the file name (opt-in)
//! 3. File system modification time
//!
//! Only the last step can fail, and only when the file cannot be stat'ed.

pub mod exif;
pub mod filename;

use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub use self::exif::{EmbeddedMetadata, ExifReader, MetadataReader};
pub use self::filename::FilenamePattern;

/// Source of the resolved timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// Embedded capture metadata
    Exif,
    /// Parsed from the file name
    Filename,
    /// File system modification time
    FileSystem,
}

/// Result of timestamp resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedTime {
    /// The resolved timestamp (local time)
    pub timestamp: NaiveDateTime,
    /// Which strategy produced it
    pub source: TimeSource,
}

/// One link of the resolution chain
pub trait TimeStrategy: Send + Sync {
    /// Source tag attached to timestamps from this strategy
    fn source(&self) -> TimeSource;

    /// Try to produce a timestamp; `None` passes to the next strategy
    fn extract(&self, path: &Path) -> Option<NaiveDateTime>;
}

/// Ordered strategy chain terminated by the modification time fallback
pub struct TimestampResolver {
    strategies: Vec<Box<dyn TimeStrategy>>,
}

impl TimestampResolver {
    /// Build a resolver from an explicit strategy list
    pub fn new(strategies: Vec<Box<dyn TimeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the resolver described by the configuration, reading EXIF from disk
    pub fn from_config(config: &Config) -> Self {
        Self::with_reader(Arc::new(ExifReader), config.filename_fallback)
    }

    /// Build the standard chain around a custom metadata reader
    pub fn with_reader(reader: Arc<dyn MetadataReader>, filename_fallback: bool) -> Self {
        let mut strategies: Vec<Box<dyn TimeStrategy>> =
            vec![Box::new(EmbeddedMetadata::new(reader))];
        if filename_fallback {
            strategies.push(Box::new(FilenamePattern));
        }
        Self::new(strategies)
    }

    /// Resolve the capture time of `path`
    pub fn resolve(&self, path: &Path) -> Result<ExtractedTime> {
        for strategy in &self.strategies {
            if let Some(timestamp) = strategy.extract(path) {
                return Ok(ExtractedTime {
                    timestamp,
                    source: strategy.source(),
                });
            }
        }

        let timestamp = modified_time(path)?;
        debug!(?path, "Using file system modification time");

        Ok(ExtractedTime {
            timestamp,
            source: TimeSource::FileSystem,
        })
    }
}

impl Default for TimestampResolver {
    fn default() -> Self {
        Self::with_reader(Arc::new(ExifReader), false)
    }
}

/// Last-modified time of `path` in local time
pub fn modified_time(path: &Path) -> Result<NaiveDateTime> {
    let modified = fs::metadata(path)?.modified()?;
    let datetime: DateTime<Local> = modified.into();
    Ok(datetime.naive_local())
}
