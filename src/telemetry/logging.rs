//! Tracing subscriber initialization
//!
//! The video core only emits `tracing` events. Hosts that don't install
//! their own subscriber can call [`init_logging`] once at startup.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Keeps the non-blocking file writer flushing; hold it for the program lifetime
pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

/// Filter override, checked before `RUST_LOG`
pub const LOG_ENV: &str = "IMMERSIVE_PLANES_LOG";
/// Set to `json` for JSON console output
pub const LOG_FORMAT_ENV: &str = "IMMERSIVE_PLANES_LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_enabled: bool,
    /// Also write to `file_path` (or `immersive_planes.log`)
    pub file_enabled: bool,
    pub file_path: Option<PathBuf>,
    pub json_format: bool,
    /// Filter used when neither environment variable is set
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }

    fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }
}

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled.
///
/// ```no_run
/// use immersive_planes::telemetry::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::default()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LogError> {
    let use_json = config.use_json();
    let mut file_guard = None;

    let file_layer = if config.file_enabled {
        let path = config
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("immersive_planes.log"));
        let file = std::fs::File::create(&path).map_err(|source| LogError::File {
            path: path.clone(),
            source,
        })?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        Some(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false),
        )
    } else {
        None
    };

    let json_layer = (config.console_enabled && use_json).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = (config.console_enabled && !use_json)
        .then(|| fmt::layer().with_target(true).with_thread_ids(false).compact());

    tracing_subscriber::registry()
        .with(config.filter())
        .with(file_layer)
        .with(json_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(
        target: "immersive_planes",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_missing_log_directory_is_reported() {
        let config = LogConfig {
            console_enabled: false,
            file_enabled: true,
            file_path: Some(PathBuf::from("/nonexistent-dir/planes.log")),
            ..LogConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(LogError::File { .. })));
    }
}
