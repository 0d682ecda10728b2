//! `tracing-subscriber` setup for binaries and tests that want to see the library's spans.
//!
//! The library itself only emits events; nothing is printed until a subscriber is installed.
//!
//! - `RUST_LOG` sets the filter (default `d2s=info,warn`).
//! - `D2S_LOG_FORMAT` selects `pretty`, `compact`, or `json` output (default `pretty`).

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::env;

pub const DEFAULT_FILTER: &str = "d2s=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl TracingFormat {
    /// Unknown names fall back to [`TracingFormat::Pretty`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => TracingFormat::Json,
            "compact" => TracingFormat::Compact,
            _ => TracingFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub format: TracingFormat,
    /// `EnvFilter` directive, e.g. `d2s=trace`.
    pub filter: String,
    pub with_ansi: bool,
    pub with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Pretty,
            filter: DEFAULT_FILTER.to_string(),
            with_ansi: true,
            with_target: true,
        }
    }
}

impl TracingConfig {
    pub fn from_env() -> Self {
        let filter = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = env::log_format()
            .map(|name| TracingFormat::parse(&name))
            .unwrap_or_default();
        Self {
            format,
            filter,
            ..Self::default()
        }
    }
}

/// Installs a global subscriber. Fails if the filter does not parse or a subscriber is already
/// set.
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;
    let layer = match config.format {
        TracingFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(config.with_ansi)
            .with_target(config.with_target)
            .boxed(),
        TracingFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(config.with_ansi)
            .with_target(config.with_target)
            .boxed(),
        TracingFormat::Json => fmt::layer()
            .json()
            .with_target(config.with_target)
            .boxed(),
    };
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_are_case_insensitive() {
        assert_eq!(TracingFormat::parse("JSON"), TracingFormat::Json);
        assert_eq!(TracingFormat::parse(" compact "), TracingFormat::Compact);
        assert_eq!(TracingFormat::parse("verbose"), TracingFormat::Pretty);
    }

    #[test]
    fn invalid_filter_is_an_error() {
        let config = TracingConfig {
            filter: "d2s=loudest".to_string(),
            ..TracingConfig::default()
        };
        assert!(init_tracing(config).is_err());
    }
}
