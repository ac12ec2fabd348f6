//! Structured logging setup.
//!
//! Everything logs through `tracing` with component targets so a session can
//! be filtered per subsystem:
//!
//! | Target | Description |
//! |--------|-------------|
//! | `painrig::session` | Session lifecycle and abort handling |
//! | `painrig::calibration` | Staircase transitions |
//! | `painrig::plan` | Trial plan generation |
//! | `painrig::trial` | Per-trial execution |
//! | `painrig::port` | Hardware port writes and failures |
//! | `painrig::persist` | Data file writes |
//!
//! ```bash
//! # Debug only the staircase
//! RUST_LOG=painrig::calibration=debug cargo run --bin session
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::errors::Result;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format (default at the experiment console)
    #[default]
    Pretty,
    /// JSON format
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration, loadable from the session TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Format for stdout logging.
    #[serde(default)]
    pub format: LogFormat,

    /// Optional log file; writes are non-blocking so they cannot stall the
    /// frame loop.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

/// Initialize the global subscriber.
///
/// Returns the file writer guard when a log file is configured; it must be
/// kept alive for the duration of the program so buffered logs are flushed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    if let Some(ref path) = config.log_file {
        let file = std::fs::File::create(path)?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        match config.format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                .init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                .init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                .init(),
        }
        Ok(Some(guard))
    } else {
        match config.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init(),
            LogFormat::Compact => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init(),
        }
        Ok(None)
    }
}
