//! Timestamps embedded in camera-style file names

use super::{TimeSource, TimeStrategy};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::trace;

/// A named pattern; groups are year, month, day and optionally h, m, s
struct NamePattern {
    label: &'static str,
    regex: Regex,
}

static PATTERNS: OnceLock<Vec<NamePattern>> = OnceLock::new();

fn patterns() -> &'static [NamePattern] {
    PATTERNS.get_or_init(|| {
        [
            // Screenshot 2024-01-15 at 14.30.00, Screenshot_20240115-143000
            (
                "screenshot",
                r"(?i)(?:screenshot|screen shot|capture)[-_\s]*(\d{4})[-_]?(\d{2})[-_]?(\d{2})[-_\s]*(?:at[-_\s]*)?(\d{1,2})[-_\.]?(\d{2})[-_\.]?(\d{2})",
            ),
            // WhatsApp: IMG-20240115-WA0001
            ("whatsapp", r"(?:IMG|VID)-(\d{4})(\d{2})(\d{2})-WA"),
            // IMG_20240115_143000, 20240115-143000
            ("compact", r"(\d{4})(\d{2})(\d{2})[_\-]?(\d{2})(\d{2})(\d{2})"),
            // 2024-01-15_14-30-00
            (
                "separated",
                r"(\d{4})[-_](\d{2})[-_](\d{2})[-_\s](\d{2})[-_.](\d{2})[-_.](\d{2})",
            ),
            // 2024-01-15
            ("date", r"(\d{4})-(\d{2})-(\d{2})"),
        ]
        .into_iter()
        .filter_map(|(label, source)| {
            Regex::new(source)
                .ok()
                .map(|regex| NamePattern { label, regex })
        })
        .collect()
    })
}

/// Parse a timestamp out of a file name, trying each pattern in order
pub fn parse_filename_time(filename: &str) -> Option<NaiveDateTime> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    patterns().iter().find_map(|pattern| {
        let caps = pattern.regex.captures(stem)?;
        let num = |i: usize| -> Option<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        let datetime = build_datetime(num(1)? as i32, num(2)?, num(3)?, num(4)?, num(5)?, num(6)?)?;
        trace!(filename, pattern = pattern.label, "Matched file name pattern");
        Some(datetime)
    })
}

fn build_datetime(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    if !(1990..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Strategy reading the file name of the path
pub struct FilenamePattern;

impl TimeStrategy for FilenamePattern {
    fn source(&self) -> TimeSource {
        TimeSource::Filename
    }

    fn extract(&self, path: &Path) -> Option<NaiveDateTime> {
        path.file_name()
            .and_then(|f| f.to_str())
            .and_then(parse_filename_time)
    }
}
