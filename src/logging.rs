//! Tracing subscriber setup for the CLI.
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary. Logs go to stderr so stdout stays machine-readable.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
    pub format: LogFormat,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    pub fn from_flags(verbose: bool, json: bool) -> Self {
        Self {
            level: if verbose { Level::DEBUG } else { Level::INFO },
            format: if json { LogFormat::Json } else { LogFormat::Text },
            ansi_colors: !json,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = self.level.as_str().to_ascii_lowercase();
            // ureq logs every request at debug
            EnvFilter::new(format!("{},ureq=warn,rustls=warn", level))
        })
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = config.env_filter();
    match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi_colors)
                .with_target(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }
    Ok(())
}
