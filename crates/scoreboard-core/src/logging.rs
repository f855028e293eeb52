//! File logging for `scorectl`
//!
//! stdout carries NDJSON events, so every log line goes to a daily rolling
//! file instead. The filter comes from `SCORECTL_LOG` and falls back to
//! [`DEFAULT_FILTER`].
//!
//! ```bash
//! SCORECTL_LOG=debug scorectl watch
//! SCORECTL_LOG=scoreboard_client::transport=trace scorectl send START_CLOCK
//! ```

use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable holding the tracing filter directives
pub const FILTER_ENV: &str = "SCORECTL_LOG";

/// Info for the workspace crates, warnings from everything else
pub const DEFAULT_FILTER: &str =
    "scoreboard_control=info,scoreboard_client=info,scoreboard_core=info,warn";

const LOG_FILE_NAME: &str = "scorectl.log";
const APP_DIR: &str = "scoreboard-control";

/// Initialize the logging subsystem.
///
/// Logs go to `log_dir` when given, otherwise to
/// `<data-local-dir>/scoreboard-control/logs/`. Returns the path of the
/// active log file.
pub fn init(log_dir: Option<&Path>) -> Result<PathBuf> {
    let log_dir = resolve_log_directory(log_dir, dirs::data_local_dir());
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    tracing_subscriber::registry()
        .with(env_filter(std::env::var(FILTER_ENV).ok().as_deref()))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Scoreboard Control {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(log_file_path(&log_dir))
}

/// Where logs are written: the explicit directory, else the per-user data
/// directory, else `./logs`
pub fn resolve_log_directory(explicit: Option<&Path>, data_local: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    match data_local {
        Some(base) => base.join(APP_DIR).join("logs"),
        None => PathBuf::from("logs"),
    }
}

/// Path of the log file inside `log_dir`
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Filter from `directives`, falling back to [`DEFAULT_FILTER`] when unset or
/// unparseable
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_directory_wins() {
        let dir = resolve_log_directory(
            Some(Path::new("/var/log/rink")),
            Some(PathBuf::from("/home/op/.local/share")),
        );
        assert_eq!(dir, PathBuf::from("/var/log/rink"));
    }

    #[test]
    fn test_data_dir_fallback() {
        let dir = resolve_log_directory(None, Some(PathBuf::from("/home/op/.local/share")));
        assert_eq!(
            dir,
            PathBuf::from("/home/op/.local/share/scoreboard-control/logs")
        );
        assert_eq!(
            log_file_path(&dir),
            PathBuf::from("/home/op/.local/share/scoreboard-control/logs/scorectl.log")
        );
    }

    #[test]
    fn test_no_data_dir_uses_relative_logs() {
        assert_eq!(resolve_log_directory(None, None), PathBuf::from("logs"));
    }

    #[test]
    fn test_invalid_filter_falls_back_to_default() {
        assert_eq!(
            env_filter(Some("scoreboard_client=loud")).to_string(),
            EnvFilter::new(DEFAULT_FILTER).to_string()
        );
        assert_eq!(
            env_filter(Some("debug")).to_string(),
            EnvFilter::new("debug").to_string()
        );
    }
}
