//! Logging setup for the `hangar` binary.
//!
//! Two sinks:
//! - stderr, filtered by `RUST_LOG` (default `warn`) so command output stays clean
//! - a daily-rolling file under `<root>/logs/`, at `info` by default
//!
//! `HANGAR_DEBUG_LOG=1` forces both to `debug`.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "HANGAR_DEBUG_LOG";

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn filter(default: &str) -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    }
}

/// Installs the global subscriber. The returned guard flushes the file sink
/// on drop, so keep it alive for the whole process.
pub fn init(logs_dir: &Path) -> Option<WorkerGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(logs_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(logs_dir, "hangar.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter("info"));
            (Some(layer), Some(guard))
        }
        Err(err) => {
            eprintln!(
                "warning: file logging disabled ({}): {}",
                logs_dir.display(),
                err
            );
            (None, None)
        }
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
