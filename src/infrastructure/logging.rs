//! Tracing subscriber setup

use crate::config::LoggingConfig;
use std::error::Error;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the log level
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Parse a level name case-insensitively.
///
/// Accepts DEBUG, INFO, WARNING (or WARN), ERROR and CRITICAL. Anything else,
/// including an empty value, falls back to INFO.
pub fn parse_log_level(value: &str) -> Level {
    match value.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARNING" | "WARN" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `LOG_LEVEL` wins over the configured level
pub fn resolve_level(env_value: Option<&str>, configured: &str) -> Level {
    match env_value {
        Some(value) if !value.trim().is_empty() => parse_log_level(value),
        _ => parse_log_level(configured),
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces the level filter.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let env_level = std::env::var(LOG_LEVEL_ENV).ok();
    let level = resolve_level(env_level.as_deref(), &config.level);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
}
