//! Command-line front end
//!
//! Provides:
//! - Argument parsing (clap)
//! - Logging setup (stderr plus optional log file)
//! - Command dispatch to the vendor clients

pub mod args;
pub mod dispatch;

pub use args::{Args, Command};
pub use dispatch::{run_cli, ExitCode};

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DB_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

fn env_filter(level: Option<&str>, config: &LoggingConfig) -> Result<EnvFilter> {
    if let Some(level) = level {
        return EnvFilter::try_new(level).map_err(|e| Error::InvalidArgs(e.to_string()));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.as_deref().unwrap_or("info"))
        .map_err(|e| Error::InvalidArgs(e.to_string()))
}

/// Install the global subscriber
///
/// Filter precedence: `level`, then `RUST_LOG`, then `[logging] level`,
/// then `info`. Logs go to stderr; with `[logging] file` they are also
/// written through a non-blocking appender whose guard must be kept alive.
pub fn init_logging(level: Option<&str>, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(level, config)?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().ok_or_else(|| {
                Error::InvalidArgs(format!("log file has no name: {}", path.display()))
            })?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_rejects_bad_level() {
        let result = env_filter(Some("=[bad"), &LoggingConfig::default());
        assert!(matches!(result, Err(Error::InvalidArgs(_))));
    }

    #[test]
    fn test_env_filter_flag_wins() {
        let config = LoggingConfig {
            file: None,
            level: Some("warn".to_string()),
        };
        let filter = env_filter(Some("debug"), &config).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }
}
