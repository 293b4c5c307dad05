//! Logging bootstrap.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogSettings;

/// Installs the global subscriber: console output plus a daily rolling file.
///
/// `RUST_LOG` takes precedence over [`LogSettings::level`]. Keep the returned
/// guard alive until exit, dropping it flushes the file writer.
pub fn init(settings: &LogSettings) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (dir, file_name) = split_log_path(&settings.file);
    let file_appender = tracing_appender::rolling::daily(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn split_log_path(path: &Path) -> (&Path, &std::ffi::OsStr) {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path.file_name().unwrap_or("agent.log".as_ref());
    (dir, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("agent.log"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "agent.log");

        let (dir, name) = split_log_path(Path::new("/var/log/shop/agent.log"));
        assert_eq!(dir, Path::new("/var/log/shop"));
        assert_eq!(name, "agent.log");

        let (dir, name) = split_log_path(Path::new("/"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "agent.log");
    }
}
