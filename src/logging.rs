//! Logging setup for the star streaming engine.
//!
//! Structured `tracing` output to a session log file (truncated on start,
//! written through a non-blocking appender) and to stdout, filtered via
//! `RUST_LOG`.

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file used when the embedding application does not pick one.
pub const DEFAULT_LOG_PATH: &str = "logs/starstream.log";

/// Keep alive for as long as logging should run; dropping it flushes and
/// closes the file writer.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Installs the global subscriber, writing to `log_path` and stdout.
///
/// The parent directory is created if missing and a previous session's file
/// is truncated. Filtering follows `RUST_LOG`, defaulting to `info`. Can
/// only be called once per process.
///
/// # Errors
///
/// Returns an error if `log_path` has no file name, its directory cannot be
/// created, or the file cannot be truncated.
pub fn init_logging(log_path: &Path) -> Result<LoggingGuard, io::Error> {
    let file_name = log_path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name")
    })?;
    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    fs::write(log_path, "")?;

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .pretty(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stdout)
                .with_ansi(true)
                .with_span_events(FmtSpan::CLOSE)
                .pretty(),
        )
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
