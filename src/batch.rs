//! Batch scheduling with a bounded Rayon pool
//!
//! Every candidate of a batch is handed to the [`Transferer`] on a dedicated
//! thread pool; all tasks are joined before the [`BatchReport`] is returned.
//! A failing file never stops the batch.

use crate::config::Config;
use crate::error::Result;
use crate::scan::collect_files;
use crate::transfer::{CandidateFile, SkipReason, TransferOutcome, Transferer};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::path::Path;
use std::thread;
use tracing::{Level, Span, info, span};

/// Upper bound on worker threads
pub const MAX_WORKERS: usize = 32;

/// `min(32, 4 x available parallelism)`
pub fn default_worker_count() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 4).min(MAX_WORKERS)
}

/// Outcomes of one or more batches
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    outcomes: Vec<TransferOutcome>,
}

impl BatchReport {
    pub fn new(outcomes: Vec<TransferOutcome>) -> Self {
        Self { outcomes }
    }

    /// Number of files moved or copied
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TransferOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcomes(&self) -> &[TransferOutcome] {
        &self.outcomes
    }

    /// Failed files with their error messages
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            TransferOutcome::Failed { source, error } => Some((source.as_path(), error.as_str())),
            _ => None,
        })
    }

    /// Skipped files with the reason they were left alone
    pub fn skips(&self) -> impl Iterator<Item = (&Path, SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            TransferOutcome::Skipped { source, reason } => Some((source.as_path(), *reason)),
            _ => None,
        })
    }

    /// Append another report's outcomes
    pub fn merge(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Processed: {}, Skipped: {}, Failed: {}",
            self.total(),
            self.processed(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Sorts origin directories into the destination tree
pub struct Organizer {
    transferer: Transferer,
    pool: ThreadPool,
    recursive: bool,
}

impl Organizer {
    /// Create an organizer with the worker pool described by the configuration
    pub fn new(config: Config) -> Result<Self> {
        let threads = config.threads;
        let recursive = config.recursive;
        Self::with_transferer(Transferer::new(config), threads, recursive)
    }

    /// Create an organizer around an existing transferer (0 threads = auto)
    pub fn with_transferer(transferer: Transferer, threads: usize, recursive: bool) -> Result<Self> {
        let workers = if threads > 0 {
            threads
        } else {
            default_worker_count()
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("photo-sorter-{i}"))
            .build()?;

        Ok(Self {
            transferer,
            pool,
            recursive,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Transfer every candidate, in no particular order
    ///
    /// Worker log lines are recorded inside the caller's current span.
    pub fn process_files(&self, candidates: &[CandidateFile]) -> BatchReport {
        let span = Span::current();
        let outcomes: Vec<TransferOutcome> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| span.in_scope(|| self.transferer.transfer(candidate)))
                .collect()
        });
        BatchReport::new(outcomes)
    }

    /// Sort all files under `origin` into `dest_root`
    pub fn process_directory(&self, origin: &Path, dest_root: &Path) -> Result<BatchReport> {
        let _span = span!(Level::INFO, "batch", ?origin).entered();

        let candidates: Vec<CandidateFile> = collect_files(origin, self.recursive)?
            .into_iter()
            .map(|source| CandidateFile::new(source, dest_root))
            .collect();

        info!(
            count = candidates.len(),
            workers = self.worker_count(),
            operation = ?self.transferer.operation(),
            "Processing directory"
        );

        let report = self.process_files(&candidates);
        info!("{}", report.summary());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileOperation;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::registry::LookupSpan;

    /// Records the message of every event nested in a span named `scope`
    struct ScopedMessages {
        scope: &'static str,
        messages: Arc<Mutex<Vec<String>>>,
    }

    #[derive(Default)]
    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S> Layer<S> for ScopedMessages
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let nested = ctx
                .event_scope(event)
                .is_some_and(|mut scope| scope.any(|span| span.name() == self.scope));
            if nested {
                let mut visitor = MessageVisitor::default();
                event.record(&mut visitor);
                self.messages.lock().unwrap().push(visitor.0);
            }
        }
    }

    fn outcome_ok(name: &str) -> TransferOutcome {
        TransferOutcome::Transferred {
            source: PathBuf::from(name),
            destination: PathBuf::from("/d").join(name),
            time_source: crate::time::TimeSource::FileSystem,
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_default_worker_count_is_bounded() {
        let workers = default_worker_count();
        assert!(workers >= 4 || workers == MAX_WORKERS);
        assert!(workers <= MAX_WORKERS);
    }

    #[test]
    fn test_report_counts() {
        let mut report = BatchReport::new(vec![
            outcome_ok("a.jpg"),
            TransferOutcome::Skipped {
                source: PathBuf::from("b.txt"),
                reason: SkipReason::UnsupportedExtension,
            },
        ]);
        report.merge(BatchReport::new(vec![
            outcome_ok("c.jpg"),
            TransferOutcome::Failed {
                source: PathBuf::from("d.jpg"),
                error: "Permission denied".into(),
            },
        ]));

        assert_eq!(report.total(), 4);
        assert_eq!(report.processed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.failures().collect::<Vec<_>>(),
            vec![(Path::new("d.jpg"), "Permission denied")]
        );
        assert_eq!(
            report.summary(),
            "Total: 4, Processed: 2, Skipped: 1, Failed: 1"
        );
    }

    #[test]
    fn test_report_serializes_tagged_outcomes() {
        let report = BatchReport::new(vec![TransferOutcome::Skipped {
            source: PathBuf::from(".x.jpg"),
            reason: SkipReason::Hidden,
        }]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "skipped");
        assert_eq!(json["outcomes"][0]["reason"], "hidden");
    }

    #[test]
    fn test_explicit_thread_count() {
        let organizer = Organizer::with_transferer(Transferer::new(Config::default()), 3, true).unwrap();
        assert_eq!(organizer.worker_count(), 3);
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("in");
        let dest = dir.path().join("out");
        fs::create_dir_all(&origin).unwrap();
        fs::create_dir_all(&dest).unwrap();
        for i in 0..20 {
            fs::write(origin.join(format!("IMG_{i:04}.JPG")), b"x").unwrap();
        }

        let config = Config {
            operation: FileOperation::Copy,
            threads: 4,
            ..Config::default()
        };
        let organizer = Organizer::new(config).unwrap();

        let mut candidates: Vec<CandidateFile> = fs::read_dir(&origin)
            .unwrap()
            .map(|e| CandidateFile::new(e.unwrap().path(), &dest))
            .collect();
        candidates.push(CandidateFile::new(origin.join("vanished.jpg"), &dest));

        let report = organizer.process_files(&candidates);
        assert_eq!(report.total(), 21);
        assert_eq!(report.processed(), 20);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_worker_events_stay_in_caller_span() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        // Rayon workers only see the global dispatcher
        tracing_subscriber::registry()
            .with(ScopedMessages {
                scope: "sorting_rolls",
                messages: Arc::clone(&messages),
            })
            .try_init()
            .unwrap();

        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("in");
        let dest = dir.path().join("out");
        fs::create_dir_all(&origin).unwrap();
        fs::create_dir_all(&dest).unwrap();
        let candidates: Vec<CandidateFile> = (0..8)
            .map(|i| {
                let path = origin.join(format!("roll_{i}.jpg"));
                fs::write(&path, b"x").unwrap();
                CandidateFile::new(path, &dest)
            })
            .collect();

        let organizer = Organizer::with_transferer(Transferer::new(Config::default()), 4, true).unwrap();
        let report = span!(Level::INFO, "sorting_rolls").in_scope(|| organizer.process_files(&candidates));
        assert_eq!(report.processed(), 8);

        let messages = messages.lock().unwrap();
        for i in 0..8 {
            let name = format!("roll_{i}.jpg");
            assert!(
                messages.iter().any(|m| m.starts_with("Copied: ") && m.contains(&name)),
                "no scoped log line for {name}: {messages:?}"
            );
        }
    }
}
