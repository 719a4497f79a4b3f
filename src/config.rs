//! Configuration types for the photo sorter

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    /// Copy files to destination, keeping the source
    #[default]
    Copy,
    /// Move files to destination
    Move,
}

impl FileOperation {
    /// Verb used in log lines
    pub fn verb(&self) -> &'static str {
        match self {
            FileOperation::Copy => "Copied",
            FileOperation::Move => "Moved",
        }
    }
}

/// Folder names of the destination tree
///
/// `<destination>/<root_folder>/<YYYY-MM>/[<raw_folder>|<screenshot_folder>]/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutNames {
    /// Top-level folder created under the destination root
    pub root_folder: String,
    /// Subfolder for RAW (`.dng`) files
    pub raw_folder: String,
    /// Subfolder for screenshots and downloads (`.png`)
    pub screenshot_folder: String,
}

impl Default for LayoutNames {
    fn default() -> Self {
        Self {
            root_folder: "iPhone_Photos".into(),
            raw_folder: "RAW_Images".into(),
            screenshot_folder: "ss_and_downloads".into(),
        }
    }
}

/// Configuration for the photo sorter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source directories to scan for media files
    pub origins: Vec<PathBuf>,

    /// Destination root directory
    pub destination: PathBuf,

    /// File operation mode
    pub operation: FileOperation,

    /// Walk origins recursively instead of only their top level
    pub recursive: bool,

    /// Number of worker threads (0 = min(32, 4 x cores))
    pub threads: usize,

    /// Try timestamps embedded in file names before the modification time
    pub filename_fallback: bool,

    /// Eligible file extensions (lowercase, without dot)
    pub extensions: Vec<String>,

    /// Destination folder names
    pub layout: LayoutNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origins: vec![],
            destination: PathBuf::new(),
            operation: FileOperation::default(),
            recursive: true,
            threads: 0, // Auto-detect
            filename_fallback: false,
            extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "heic".into(),
                "dng".into(), "mov".into(), "mp4".into(), "aae".into(),
            ],
            layout: LayoutNames::default(),
        }
    }
}

impl Config {
    /// Check if a file extension is eligible for sorting
    pub fn is_supported(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext_lower))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Photo Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Source directories (an iPhone export, a DCIM dump, ...)
origins = [
    "/media/iphone/DCIM",
]

# Destination root; files land under <destination>/iPhone_Photos/YYYY-MM/
destination = "/srv/photos"

# File operation: "copy" or "move"
operation = "copy"

# Walk origins recursively
recursive = true

# Number of worker threads (0 = min(32, 4 x CPU cores))
threads = 0

# Use timestamps embedded in names like IMG_20240115_143000.jpg
# before falling back to the file modification time
filename_fallback = false

# Eligible extensions
extensions = ["jpg", "jpeg", "png", "heic", "dng", "mov", "mp4", "aae"]

[layout]
root_folder = "iPhone_Photos"
raw_folder = "RAW_Images"
screenshot_folder = "ss_and_downloads"
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
