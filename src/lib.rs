//! Photo Sorter - sort iPhone photo and video exports by capture month
//!
//! Files from one or more origin directories are moved or copied into
//! `<dest>/iPhone_Photos/<YYYY-MM>/`, with support for:
//! - EXIF `DateTimeOriginal` capture times, falling back to file modification time
//! - Optional file name timestamp parsing
//! - RAW (`.dng`) and screenshot (`.png`) subfolders
//! - Collision-free naming (`name_1.ext`, `name_2.ext`, ...) under concurrency
//! - Parallel processing with a bounded Rayon pool
//! - Per-file outcome reports

pub mod batch;
pub mod cli;
pub mod collision;
pub mod config;
pub mod error;
pub mod layout;
pub mod scan;
pub mod time;
pub mod transfer;

pub use batch::{BatchReport, Organizer, default_worker_count};
pub use cli::Cli;
pub use config::{Config, ConfigError, FileOperation, LayoutNames};
pub use error::{Error, Result};
pub use layout::{Layout, MediaCategory};
pub use time::{ExtractedTime, TimeSource, TimestampResolver};
pub use transfer::{CandidateFile, SkipReason, TransferOutcome, Transferer};
