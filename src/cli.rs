//! CLI argument parsing with clap

use crate::config::{Config, FileOperation};
use clap::Parser;
use std::path::PathBuf;

/// Photo Sorter - sort iPhone photo and video exports by capture month
///
/// Files land under <dest>/iPhone_Photos/YYYY-MM/, with RAW (.dng) files in
/// RAW_Images/ and PNG screenshots or downloads in ss_and_downloads/.
#[derive(Parser, Debug)]
#[command(name = "photo-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// CLI arguments override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Source directory (repeat to add more: --origin A --origin B)
    #[arg(short, long = "origin", value_name = "DIR")]
    pub origins: Vec<PathBuf>,

    /// Destination root directory
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Move files instead of copying them
    #[arg(long, overrides_with = "copy")]
    pub r#move: bool,

    /// Copy files, keeping the originals (default)
    #[arg(long, overrides_with = "move")]
    pub copy: bool,

    /// Descend into subdirectories of each origin (default)
    #[arg(long, overrides_with = "no_recursive")]
    pub recursive: bool,

    /// Only sort the top level of each origin
    #[arg(long, overrides_with = "recursive")]
    pub no_recursive: bool,

    /// Number of worker threads (0 = min(32, 4 x cores))
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Use timestamps in file names before the modification time
    #[arg(long)]
    pub filename_dates: bool,

    /// Write a JSON report of every file outcome
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log file format as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Cli {
    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if !self.origins.is_empty() {
            config.origins = self.origins.clone();
        }
        if let Some(ref dest) = self.dest {
            config.destination = dest.clone();
        }
        if self.r#move {
            config.operation = FileOperation::Move;
        } else if self.copy {
            config.operation = FileOperation::Copy;
        }
        if self.no_recursive {
            config.recursive = false;
        } else if self.recursive {
            config.recursive = true;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.filename_dates {
            config.filename_fallback = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
