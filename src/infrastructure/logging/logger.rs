use std::io;

use anyhow::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::config::LoggingConfig;

const LOG_FILE_NAME: &str = "trellis.log";

/// Logger implementation using tracing
///
/// Console output goes to stderr so that command results on stdout stay
/// machine readable. Holds the file writer guard; drop it last.
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Initialize the global subscriber with the given configuration
    ///
    /// `RUST_LOG` directives, when present, take precedence over the
    /// configured level.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;

        let console_layer = if config.format == "json" {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter(default_level))
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter(default_level))
                .boxed()
        };

        let (file_layer, guard) = match config.log_dir {
            Some(ref log_dir) => {
                let appender = file_appender(log_dir, &config.rotation)?;
                let (non_blocking_file, guard) = tracing_appender::non_blocking(appender);

                // File output is always JSON for structured ingestion
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking_file)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter(default_level))
                    .boxed();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!(
            level = %config.level,
            format = %config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

fn file_appender(log_dir: &std::path::Path, rotation: &str) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    let appender = match rotation {
        "daily" => rolling::daily(log_dir, LOG_FILE_NAME),
        "hourly" => rolling::hourly(log_dir, LOG_FILE_NAME),
        "never" => rolling::never(log_dir, LOG_FILE_NAME),
        other => anyhow::bail!("Invalid log rotation: {other}"),
    };
    Ok(appender)
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(matches!(parse_log_level("TRACE"), Ok(Level::TRACE)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_file_appender_rejects_unknown_rotation() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_appender(dir.path(), "weekly").is_err());
        assert!(file_appender(dir.path(), "never").is_ok());
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("trellis");
        file_appender(&nested, "daily").unwrap();
        assert!(nested.is_dir());
    }

    // Global subscriber initialization is exercised once, by the binary.
}
