//! Single-file transfer: eligibility, timestamp, destination, move or copy

use crate::collision::{self, Reservation};
use crate::config::{Config, FileOperation};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::time::{ExtractedTime, TimeSource, TimestampResolver};
use chrono::NaiveDateTime;
use filetime::FileTime;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Buffer size used when streaming file contents
const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// A source file paired with the destination root it is sorted into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub source: PathBuf,
    pub destination_root: PathBuf,
}

impl CandidateFile {
    pub fn new(source: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination_root: destination_root.into(),
        }
    }
}

/// Why a file was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Name starts with `.`
    Hidden,
    /// Extension not in the allow-list
    UnsupportedExtension,
    /// Directory, socket, ...
    NotAFile,
}

/// Outcome of one transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Transferred {
        source: PathBuf,
        destination: PathBuf,
        time_source: TimeSource,
        timestamp: NaiveDateTime,
    },
    Skipped {
        source: PathBuf,
        reason: SkipReason,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Transferred { .. })
    }

    pub fn source(&self) -> &Path {
        match self {
            TransferOutcome::Transferred { source, .. }
            | TransferOutcome::Skipped { source, .. }
            | TransferOutcome::Failed { source, .. } => source,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            TransferOutcome::Transferred { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

/// Moves or copies candidates into the dated layout
pub struct Transferer {
    config: Config,
    layout: Layout,
    resolver: TimestampResolver,
}

impl Transferer {
    pub fn new(config: Config) -> Self {
        let resolver = TimestampResolver::from_config(&config);
        Self::with_resolver(config, resolver)
    }

    /// Use a custom timestamp resolver (e.g. another metadata reader)
    pub fn with_resolver(config: Config, resolver: TimestampResolver) -> Self {
        let layout = Layout::new(config.layout.clone());
        Self {
            config,
            layout,
            resolver,
        }
    }

    pub fn operation(&self) -> FileOperation {
        self.config.operation
    }

    /// Name-based eligibility check; `None` means eligible
    pub fn eligibility(&self, path: &Path) -> Option<SkipReason> {
        let filename = path.file_name().map(|f| f.to_string_lossy());
        let Some(filename) = filename else {
            return Some(SkipReason::NotAFile);
        };
        if filename.starts_with('.') {
            return Some(SkipReason::Hidden);
        }

        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.is_supported(ext));
        if !supported {
            return Some(SkipReason::UnsupportedExtension);
        }

        // A failing stat is left to the transfer itself, where it is reported
        match fs::metadata(path) {
            Ok(metadata) if !metadata.is_file() => Some(SkipReason::NotAFile),
            _ => None,
        }
    }

    /// Transfer one candidate; never panics or returns an error
    pub fn transfer(&self, candidate: &CandidateFile) -> TransferOutcome {
        let source = candidate.source.clone();

        if let Some(reason) = self.eligibility(&source) {
            debug!(?source, ?reason, "Skipping file");
            return TransferOutcome::Skipped { source, reason };
        }

        match self.try_transfer(candidate) {
            Ok((destination, time_info)) => {
                let filename = display_name(&source);
                let folder = destination
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!(
                    destination = ?destination,
                    time_source = ?time_info.source,
                    timestamp = %time_info.timestamp,
                    "{}: {} → {}",
                    self.config.operation.verb(),
                    filename,
                    folder
                );
                TransferOutcome::Transferred {
                    source,
                    destination,
                    time_source: time_info.source,
                    timestamp: time_info.timestamp,
                }
            }
            Err(e) => {
                error!(file = %display_name(&source), error = %e, "Error processing file");
                TransferOutcome::Failed {
                    source,
                    error: e.to_string(),
                }
            }
        }
    }

    fn try_transfer(&self, candidate: &CandidateFile) -> Result<(PathBuf, ExtractedTime)> {
        let source = &candidate.source;
        let filename = source.file_name().ok_or_else(|| Error::InvalidFilename {
            path: source.clone(),
        })?;

        let time_info = self.resolver.resolve(source)?;
        let dir = self.layout.map_destination(
            &filename.to_string_lossy(),
            &time_info.timestamp,
            &candidate.destination_root,
        )?;

        let mut reservation = collision::reserve(&dir, filename)?;
        match self.config.operation {
            FileOperation::Copy => copy_with_metadata(source, &mut reservation)?,
            FileOperation::Move => move_into(source, &mut reservation)?,
        }

        Ok((reservation.commit(), time_info))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Rename over the reserved placeholder, copying across file systems
fn move_into(source: &Path, reservation: &mut Reservation) -> Result<()> {
    reservation.close();

    match fs::rename(source, reservation.path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(?source, error = %e, "Cross-device move, falling back to copy and delete");
            copy_with_metadata(source, reservation)?;
            fs::remove_file(source)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy contents, then access/modification times and permissions
fn copy_with_metadata(source: &Path, reservation: &mut Reservation) -> Result<()> {
    let metadata = fs::metadata(source)?;

    let dest_file = match reservation.take_file() {
        Some(file) => file,
        None => OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(reservation.path())?,
    };
    copy_file(source, dest_file)?;

    let dest = reservation.path();
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )?;
    fs::set_permissions(dest, metadata.permissions())?;

    Ok(())
}

/// Copy file with buffered I/O into an already open destination
fn copy_file(source: &Path, dest_file: File) -> Result<()> {
    let src_file = File::open(source)?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MetadataReader;
    use chrono::{Datelike, Local, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Pretends every file carries the same capture time
    struct FixedCapture(&'static str);

    impl MetadataReader for FixedCapture {
        fn capture_time_tag(&self, _path: &Path) -> Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    fn transferer(operation: FileOperation) -> Transferer {
        let config = Config {
            operation,
            ..Config::default()
        };
        let resolver = TimestampResolver::with_reader(Arc::new(FixedCapture("2023:05:14 10:00:00")), false);
        Transferer::with_resolver(config, resolver)
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dest).unwrap();
        (dir, src, dest)
    }

    #[test]
    fn test_eligibility() {
        let (_dir, src, _dest) = setup();
        let t = transferer(FileOperation::Copy);

        for name in ["a.jpg", "b.JPEG", "c.Png", "d.heic", "e.DNG", "f.mov", "g.MP4", "h.aae"] {
            let path = src.join(name);
            fs::write(&path, b"x").unwrap();
            assert_eq!(t.eligibility(&path), None, "{name}");
        }

        fs::write(src.join(".hidden.jpg"), b"x").unwrap();
        assert_eq!(t.eligibility(&src.join(".hidden.jpg")), Some(SkipReason::Hidden));
        fs::write(src.join("note.txt"), b"x").unwrap();
        assert_eq!(
            t.eligibility(&src.join("note.txt")),
            Some(SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            t.eligibility(&src.join("noext")),
            Some(SkipReason::UnsupportedExtension)
        );
        fs::create_dir(src.join("album.jpg")).unwrap();
        assert_eq!(t.eligibility(&src.join("album.jpg")), Some(SkipReason::NotAFile));
    }

    #[test]
    fn test_ineligible_files_are_untouched() {
        let (_dir, src, dest) = setup();
        let t = transferer(FileOperation::Move);

        for name in ["note.txt", ".hidden.jpg"] {
            let path = src.join(name);
            fs::write(&path, b"keep").unwrap();
            let outcome = t.transfer(&CandidateFile::new(&path, &dest));
            assert!(matches!(outcome, TransferOutcome::Skipped { .. }));
            assert!(path.exists());
        }
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_keeps_source_and_metadata() {
        let (_dir, src, dest) = setup();
        let path = src.join("IMG_001.JPG");
        fs::write(&path, b"jpeg bytes").unwrap();
        let mtime = Local.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).single().unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime.timestamp(), 0)).unwrap();

        let outcome = transferer(FileOperation::Copy).transfer(&CandidateFile::new(&path, &dest));
        let target = dest.join("iPhone_Photos/2023-05/IMG_001.JPG");
        assert_eq!(outcome.destination(), Some(target.as_path()));
        assert!(outcome.is_success());

        assert_eq!(fs::read(&path).unwrap(), b"jpeg bytes");
        assert_eq!(fs::read(&target).unwrap(), b"jpeg bytes");
        let copied = FileTime::from_last_modification_time(&fs::metadata(&target).unwrap());
        assert_eq!(copied.unix_seconds(), mtime.timestamp());
    }

    #[test]
    fn test_move_removes_source() {
        let (_dir, src, dest) = setup();
        let path = src.join("clip.mov");
        fs::write(&path, b"movie").unwrap();

        let outcome = transferer(FileOperation::Move).transfer(&CandidateFile::new(&path, &dest));
        assert!(outcome.is_success());
        assert!(!path.exists());
        assert_eq!(
            fs::read(dest.join("iPhone_Photos/2023-05/clip.mov")).unwrap(),
            b"movie"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_cross_device_move_copies_then_deletes() {
        let shm = Path::new("/dev/shm");
        if !shm.is_dir() {
            return;
        }
        let Ok(src) = TempDir::new_in(shm) else {
            return;
        };
        let dest = TempDir::new().unwrap();
        let path = src.path().join("clip.mov");
        fs::write(&path, b"movie").unwrap();
        let mtime = Local.with_ymd_and_hms(2020, 3, 4, 9, 0, 0).single().unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime.timestamp(), 0)).unwrap();

        let outcome =
            transferer(FileOperation::Move).transfer(&CandidateFile::new(&path, dest.path()));
        let target = dest.path().join("iPhone_Photos/2023-05/clip.mov");
        assert_eq!(outcome.destination(), Some(target.as_path()));

        assert!(!path.exists());
        assert_eq!(fs::read(&target).unwrap(), b"movie");
        let moved = FileTime::from_last_modification_time(&fs::metadata(&target).unwrap());
        assert_eq!(moved.unix_seconds(), mtime.timestamp());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_rename_is_not_retried_as_copy() {
        let (_dir, src, dest) = setup();

        // Renaming a directory over a regular file fails with ENOTDIR
        let mut reservation =
            collision::reserve(&dest, std::ffi::OsStr::new("album.mov")).unwrap();
        match move_into(&src, &mut reservation) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotADirectory),
            other => panic!("expected rename error, got {other:?}"),
        }
        assert!(src.is_dir());
        assert_eq!(fs::metadata(reservation.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_same_name_from_two_sources() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(src.join("a")).unwrap();
        fs::create_dir_all(src.join("b")).unwrap();
        fs::write(src.join("a/photo.dng"), b"one").unwrap();
        fs::write(src.join("b/photo.dng"), b"two").unwrap();

        let t = transferer(FileOperation::Copy);
        let first = t.transfer(&CandidateFile::new(src.join("a/photo.dng"), &dest));
        let second = t.transfer(&CandidateFile::new(src.join("b/photo.dng"), &dest));

        let raw = dest.join("iPhone_Photos/2023-05/RAW_Images");
        assert_eq!(first.destination(), Some(raw.join("photo.dng").as_path()));
        assert_eq!(second.destination(), Some(raw.join("photo_1.dng").as_path()));
        assert_eq!(fs::read(raw.join("photo.dng")).unwrap(), b"one");
        assert_eq!(fs::read(raw.join("photo_1.dng")).unwrap(), b"two");
    }

    #[test]
    fn test_missing_source_fails_without_leftovers() {
        let (_dir, src, dest) = setup();
        let outcome =
            transferer(FileOperation::Copy).transfer(&CandidateFile::new(src.join("gone.jpg"), &dest));

        match outcome {
            TransferOutcome::Failed { ref error, .. } => assert!(!error.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!dest.join("iPhone_Photos/2023-05/gone.jpg").exists());
    }

    #[test]
    fn test_failed_copy_releases_reserved_name() {
        let (_dir, src, dest) = setup();

        // Reading a directory as the source fails mid-copy
        let mut reservation =
            collision::reserve(&dest, std::ffi::OsStr::new("IMG_9.jpg")).unwrap();
        let err = copy_with_metadata(&src, &mut reservation);
        assert!(err.is_err());
        let reserved = reservation.path().to_path_buf();
        drop(reservation);
        assert!(!reserved.exists());
    }

    #[test]
    fn test_falls_back_to_mtime_month() {
        let (_dir, src, dest) = setup();
        let path = src.join("photo.dng");
        fs::write(&path, b"raw").unwrap();
        let mtime = Local.with_ymd_and_hms(2022, 11, 2, 12, 0, 0).single().unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime.timestamp(), 0)).unwrap();

        let t = Transferer::new(Config::default());
        let outcome = t.transfer(&CandidateFile::new(&path, &dest));
        match outcome {
            TransferOutcome::Transferred {
                destination,
                time_source,
                timestamp,
                ..
            } => {
                assert_eq!(time_source, TimeSource::FileSystem);
                assert_eq!((timestamp.year(), timestamp.month()), (2022, 11));
                assert_eq!(
                    destination,
                    dest.join("iPhone_Photos/2022-11/RAW_Images/photo.dng")
                );
            }
            other => panic!("expected transfer, got {other:?}"),
        }
    }
}
