//! Photo Sorter - sort iPhone photo and video exports by capture month

use anyhow::{Context, Result};
use clap::Parser;
use photo_sorter::scan::dedupe_origins;
use photo_sorter::{BatchReport, Cli, Config, FileOperation, Organizer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli_output {
    //! Colored summary output for the terminal

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_title(title: &str) {
        let _ = stdout().execute(Print(format!("=== {} ===\n", title.bold())));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: &str, color: Color) {
        let key_styled = style(key).with(CliTheme::HINT);
        let value_styled = style(value).with(color).bold();
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(key_styled));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(value_styled));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Photo Sorter starting");

    let config = load_config(&cli)?;
    if cli.verbose {
        info!(?config, "Configuration loaded");
    }
    validate_config(&config)?;

    let report = run(&config)?;

    if let Some(ref report_path) = cli.report {
        write_report(&report, report_path)?;
        info!(report = %report_path.display(), "Wrote batch report");
    }

    Ok(())
}

/// Sort every origin as its own batch and print the summary
fn run(config: &Config) -> Result<BatchReport> {
    use cli_output::*;

    let start = Instant::now();
    print_title("Photo Organization");
    let mode = match config.operation {
        FileOperation::Move => "MOVE",
        FileOperation::Copy => "COPY",
    };
    print_stat("Mode", mode, CliTheme::ACCENT);

    let organizer = Organizer::new(config.clone())?;
    let mut report = BatchReport::default();

    for origin in dedupe_origins(&config.origins) {
        print_blank();
        print_hint(&format!("Processing: {}", origin.display()));

        match organizer.process_directory(&origin, &config.destination) {
            Ok(batch) => {
                print_stat(
                    "Processed files in this folder",
                    &batch.processed().to_string(),
                    CliTheme::SUCCESS,
                );
                report.merge(batch);
            }
            Err(e) => {
                error!(?origin, error = %e, "Failed to process origin");
                print_error(&format!("{}: {}", origin.display(), e));
            }
        }
    }

    print_blank();
    print_title("Organization Complete");
    print_stat("Total files processed", &report.processed().to_string(), CliTheme::SUCCESS);
    print_stat("Skipped", &report.skipped().to_string(), CliTheme::WARNING);
    print_stat("Failed", &report.failed().to_string(), CliTheme::ERROR);
    print_stat(
        "Destination structure",
        &format!(
            "{}/{}/YYYY-MM/[{}|{}]",
            config.destination.display(),
            config.layout.root_folder,
            config.layout.raw_folder,
            config.layout.screenshot_folder
        ),
        CliTheme::ACCENT,
    );
    print_stat(
        "Total time",
        &format!("{:.2}s", start.elapsed().as_secs_f64()),
        CliTheme::ACCENT,
    );

    if report.failed() > 0 {
        print_blank();
        for (source, message) in report.failures() {
            print_error(&format!("{}: {}", source.display(), message));
        }
    }

    info!("{}", report.summary());
    Ok(report)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => {
            info!(config_file = %path.display(), "Loading configuration from file");
            cli.merge_with_config(Config::load_from_file(path)?)
        }
        None => cli.to_config(),
    };
    Ok(config)
}

/// Reject setups the sorter cannot run against
fn validate_config(config: &Config) -> Result<()> {
    if config.origins.is_empty() {
        anyhow::bail!("No origin directory given (use --origin)");
    }
    if config.destination.as_os_str().is_empty() {
        anyhow::bail!("No destination directory given (use --dest)");
    }
    if !config.destination.is_dir() {
        anyhow::bail!(
            "Destination is not an existing directory: {}",
            config.destination.display()
        );
    }

    let destination = canonical_or_raw(&config.destination);
    for origin in &config.origins {
        if !origin.is_dir() {
            anyhow::bail!("Origin is not an existing directory: {}", origin.display());
        }
        if config.recursive && destination.starts_with(canonical_or_raw(origin)) {
            anyhow::bail!(
                "Destination {} is inside origin {}",
                config.destination.display(),
                origin.display()
            );
        }
    }

    Ok(())
}

fn canonical_or_raw(path: &Path) -> std::path::PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Stderr logging, plus an optional non-blocking log file
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    let Some(ref log_path) = cli.log_file else {
        subscriber.init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}
