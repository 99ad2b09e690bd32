//! Logging initialization.
//!
//! Logs go to stderr so command output on stdout stays machine-readable,
//! or to a file when `[logging] file` is set.

use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

// The file writer flushes on drop, so the guard lives for the whole process.
static LOG_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(None);

/// Initialize logging. `level` overrides the configured filter.
pub fn init_telemetry(config: &LoggingConfig, level: Option<&str>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level.unwrap_or(&config.level))?;
    let json = config.format == "json";

    match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).try_init()?;
            } else {
                tracing_subscriber::registry().with(filter).with(layer).try_init()?;
            }

            if let Ok(mut slot) = LOG_GUARD.lock() {
                *slot = Some(guard);
            }
        }
        None => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).try_init()?;
            } else {
                tracing_subscriber::registry().with(filter).with(layer.pretty()).try_init()?;
            }
        }
    }

    Ok(())
}
