// ============================================================
// Layer 6 — Logging
// ============================================================
// Two sinks behind one EnvFilter:
//   stdout                       — human-readable progress
//   <logs_dir>/qa.YYYY-MM-DD     — daily file, no ANSI colours
//
// A non-empty RUST_LOG replaces the default `squad_qa=info`.
// If the log directory is not writable the file sink is skipped
// and a warning goes to stderr.

use anyhow::Result;
use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "qa";
const DEFAULT_DIRECTIVES: &str = "squad_qa=info";

fn writable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let marker = dir.join(".qa_write_test");
    fs::OpenOptions::new().create(true).append(true).open(&marker)?;
    fs::remove_file(&marker)
}

/// User directives win as a whole; unparsable ones fall back to the default.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// whole program, otherwise buffered file lines are lost on exit.
pub fn init_logging(logs_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    // `rolling::daily` panics if it cannot create the file, so check first.
    let (file_layer, guard) = match writable(logs_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: cannot write to log directory '{}' ({e}), file logging disabled",
                logs_dir.display()
            );
            (None, None)
        }
    };

    let console_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if guard.is_some() {
        tracing::debug!("Logging to '{}/{LOG_FILE_PREFIX}.*'", logs_dir.display());
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_creates_missing_directory() {
        let dir    = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        writable(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    }

    fn debug_enabled(filter: EnvFilter) -> bool {
        let subscriber = tracing_subscriber::registry().with(filter);
        tracing::subscriber::with_default(subscriber, || {
            tracing::enabled!(target: "squad_qa::ml::eval_loop", tracing::Level::DEBUG)
        })
    }

    #[test]
    fn test_rust_log_debug_reaches_crate_targets() {
        assert!(debug_enabled(env_filter(Some("squad_qa=debug"))));
        assert!(debug_enabled(env_filter(Some("warn,squad_qa::ml=debug"))));
    }

    #[test]
    fn test_default_filter_is_info() {
        assert!(!debug_enabled(env_filter(None)));
        assert!(!debug_enabled(env_filter(Some("  "))));
    }
}
