//! Tracing initialization.
//!
//! Log verbosity is controlled by the standard `RUST_LOG` environment variable
//! (default `info`). The output format is selected by `log_format` in the
//! configuration file:
//!
//! ```yaml
//! log_format: json
//! ```
//!
//! Text output is intended for local development; JSON output emits one object per
//! event with the active span fields attached, ready for a log aggregator.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Initialize the global tracing subscriber
pub fn init_telemetry(log_format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_span_list(false))
                .try_init()?;
        }
    }

    info!(format = ?log_format, "Telemetry initialized");
    Ok(())
}
