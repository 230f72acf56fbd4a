use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

// Keep the non-blocking writers alive for the whole process.
static CONSOLE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static BOOTLOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber: `RUST_LOG` (default `info`), a console
/// layer on stdout and, when `bootlog` is given, a plain-text layer appending
/// to that file. Only the first call in a process has an effect.
pub fn init_logging(bootlog: Option<&Path>) {
    // Bridge `log` → `tracing` *before* installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (nb_stdout, guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = CONSOLE_GUARD.set(guard);
    let console_layer = fmt::layer()
        .with_writer(nb_stdout)
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let file_layer = bootlog.and_then(open_bootlog).map(|file| {
        let (nb_file, guard) = tracing_appender::non_blocking(file);
        let _ = BOOTLOG_GUARD.set(guard);
        fmt::layer()
            .with_writer(nb_file)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });

    let _ = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn open_bootlog(path: &Path) -> Option<std::fs::File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Failed to open boot log '{}': {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootlog_is_created_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boot.log");
        std::fs::write(&path, "previous\n").unwrap();

        let file = open_bootlog(&path);
        assert!(file.is_some());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");
    }

    #[test]
    fn unwritable_bootlog_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_bootlog(&dir.path().join("missing").join("boot.log")).is_none());
    }
}
