//! Logging setup.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup logging with the given level.
///
/// Output goes to stderr, or to a daily rolling file when `file` is set.
/// `RUST_LOG` overrides `level`. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn setup_logging(level: &str, json: bool, file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard) = match file {
        Some(path) => {
            let (dir, prefix) = split_log_path(path);
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = file.is_none();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .init();
    }

    guard
}

/// Directory and file name prefix for the rolling appender.
fn split_log_path(path: &Path) -> (PathBuf, OsString) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("quotebar.log"));
    (dir, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, prefix) = split_log_path(Path::new("logs/quotebar.log"));
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(prefix, OsString::from("quotebar.log"));

        let (dir, _) = split_log_path(Path::new("bare.log"));
        assert_eq!(dir, PathBuf::from("."));
    }
}
