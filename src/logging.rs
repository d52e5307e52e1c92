use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Crates that log every statement or connection at info and below
const QUIET_TARGETS: &[&str] = &["sqlx", "hyper_util", "reqwest"];

/// Install the global subscriber: a rolling log file (text or JSON) plus
/// human-readable stdout.
///
/// Keep the returned guard alive for the lifetime of the process or
/// buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(rotation(&config.rotation))
        .filename_prefix(&config.log_file)
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log directory: {}", config.log_dir))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.log_level)))
        .with_context(|| format!("Invalid log_level: {}", config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // Container logs: structured file, plain stdout
        let file_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(file_writer)
            .with_ansi(false);
        registry
            .with(file_layer)
            .with(fmt::layer().with_target(false).with_ansi(false))
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(file_writer)
            .with_ansi(false);
        registry
            .with(file_layer)
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    Ok(guard)
}

/// `rotation` config value; anything unrecognised means a single file
fn rotation(name: &str) -> Rotation {
    match name.to_ascii_lowercase().as_str() {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Configured level for everything except [`QUIET_TARGETS`], which stay at warn
fn filter_directives(level: &str) -> String {
    QUIET_TARGETS
        .iter()
        .fold(level.to_string(), |acc, target| format!("{},{}=warn", acc, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("daily"), Rotation::DAILY);
        assert_eq!(rotation("Hourly"), Rotation::HOURLY);
        assert_eq!(rotation("never"), Rotation::NEVER);
        assert_eq!(rotation("weekly"), Rotation::NEVER);
    }

    #[test]
    fn test_filter_quiets_database_and_http_clients() {
        let directives = filter_directives("debug");
        assert_eq!(directives, "debug,sqlx=warn,hyper_util=warn,reqwest=warn");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
