//! Logging setup for binaries and long-running hosts.
//!
//! - Human-readable output on stderr, leaving stdout free for command output
//! - Optional plain-text log file, truncated at start-up
//! - Level filter from `RUST_LOG`, defaulting to [`DEFAULT_LOG_FILTER`]
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the host installs a subscriber, for example with [`init_logging`].

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Keeps the file writer alive.
///
/// Dropping this guard flushes and closes the log file.
#[must_use = "logs are lost if the guard is dropped immediately"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Builds the level filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber.
///
/// With `log_file` set, events are also written there without ANSI colors.
/// The parent directory is created and any previous file is cleared.
///
/// # Errors
///
/// Returns an error if the log file cannot be prepared or a global
/// subscriber is already installed.
pub fn init_logging(log_file: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let (dir, name) = prepare_log_file(path)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LOG_FILTER))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Creates the parent directory and truncates the file.
///
/// Returns the directory and file name for the appender.
fn prepare_log_file(path: &Path) -> Result<(&Path, &std::ffi::OsStr), io::Error> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path {} has no file name", path.display()),
        )
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir)?;
    fs::write(path, "")?;
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    // init_logging installs a process-wide subscriber, so tests cover the
    // file preparation only.

    #[test]
    fn test_prepare_creates_directory_and_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("tiles.log");

        let (dir, name) = prepare_log_file(&path).unwrap();
        assert_eq!(dir, temp.path().join("nested"));
        assert_eq!(name, "tiles.log");
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_clears_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tiles.log");
        fs::write(&path, "old log data").unwrap();

        prepare_log_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_rejects_path_without_file_name() {
        let err = prepare_log_file(Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
