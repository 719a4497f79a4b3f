//! Embedded capture time from EXIF metadata

use super::{TimeSource, TimeStrategy};
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Fixed EXIF date layout: "YYYY:MM:DD HH:MM:SS"
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Black-box metadata decoder: file -> optional capture time tag value
pub trait MetadataReader: Send + Sync {
    /// Raw value of the original capture time tag, if present
    fn capture_time_tag(&self, path: &Path) -> Result<Option<String>>;
}

/// Reads `DateTimeOriginal` with kamadak-exif (JPEG, HEIF, PNG, TIFF/DNG, WebP)
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn capture_time_tag(&self, path: &Path) -> Result<Option<String>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let exif = Reader::new()
            .read_from_container(&mut reader)
            .map_err(|e| Error::MetadataRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let Some(field) = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) else {
            return Ok(None);
        };

        match field.value {
            Value::Ascii(ref parts) => Ok(parts
                .first()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())),
            _ => Err(Error::MetadataRead {
                path: path.to_path_buf(),
                message: "DateTimeOriginal is not an ASCII value".to_string(),
            }),
        }
    }
}

/// Parse an EXIF capture time against the fixed layout
pub fn parse_capture_time(raw: &str) -> Result<NaiveDateTime> {
    // Only NUL padding is stripped; chrono would skip leading blanks itself
    let value = raw.trim_matches('\0');
    if value.trim() != value {
        return Err(Error::TimestampParse {
            source_info: format!("EXIF value {value:?}"),
            message: "surrounding whitespace".to_string(),
        });
    }
    NaiveDateTime::parse_from_str(value, EXIF_DATETIME_FORMAT).map_err(|e| {
        Error::TimestampParse {
            source_info: format!("EXIF value {value:?}"),
            message: e.to_string(),
        }
    })
}

/// Strategy backed by a [`MetadataReader`]; never fails, only passes
pub struct EmbeddedMetadata {
    reader: Arc<dyn MetadataReader>,
}

impl EmbeddedMetadata {
    pub fn new(reader: Arc<dyn MetadataReader>) -> Self {
        Self { reader }
    }
}

impl TimeStrategy for EmbeddedMetadata {
    fn source(&self) -> TimeSource {
        TimeSource::Exif
    }

    fn extract(&self, path: &Path) -> Option<NaiveDateTime> {
        match self.reader.capture_time_tag(path) {
            Ok(Some(raw)) => match parse_capture_time(&raw) {
                Ok(datetime) => {
                    trace!(?path, %datetime, "Found EXIF capture time");
                    Some(datetime)
                }
                Err(e) => {
                    debug!(?path, error = %e, "Unparseable EXIF capture time");
                    None
                }
            },
            Ok(None) => {
                debug!(?path, "No EXIF capture time tag");
                None
            }
            Err(Error::Io(e)) => {
                debug!(?path, error = %e, "File unreadable for metadata");
                None
            }
            Err(e) => {
                debug!(?path, error = %e, "EXIF error");
                None
            }
        }
    }
}
