//! Log subscriber setup.
//!
//! The `[log]` section of the config file picks the filter and output
//! format. `CLICKREPLAY_LOG` (or `RUST_LOG`) and `CLICKREPLAY_LOG_FORMAT`
//! override it, and `-v` turns on per-step debug output. Everything goes to
//! stderr so `clickreplay run` keeps stdout for the outcome JSON.
//!
//! ```bash
//! # Per-step logging for replays, warn for everything else
//! CLICKREPLAY_LOG=clickreplay=debug,warn clickreplay serve
//!
//! # JSON lines for log aggregation
//! CLICKREPLAY_LOG_FORMAT=json clickreplay serve
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

pub const LOG_ENV: &str = "CLICKREPLAY_LOG";
pub const LOG_FORMAT_ENV: &str = "CLICKREPLAY_LOG_FORMAT";

const DEFAULT_FILTER: &str = "clickreplay=info,warn";
const VERBOSE_FILTER: &str = "clickreplay=debug,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Case-insensitive; unknown values fall back to pretty.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// The `[log]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `clickreplay=debug,warp=warn`
    pub filter: String,
    pub format: LogFormat,
    /// Attach source file and line to every event
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Layer the environment overrides on top of the configured values.
    pub fn with_env(mut self) -> Self {
        if let Some(filter) = env_value(LOG_ENV).or_else(|| env_value("RUST_LOG")) {
            self.filter = filter;
        }
        if let Some(format) = env_value(LOG_FORMAT_ENV) {
            self.format = LogFormat::parse(&format);
        }
        self
    }

    /// Used by `-v`.
    pub fn verbose(mut self) -> Self {
        self.filter = VERBOSE_FILTER.to_string();
        self.source_location = true;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    fn output_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.source_location)
            .with_line_number(self.source_location);
        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &LogConfig) {
    let _ = tracing_subscriber::registry()
        .with(config.output_layer())
        .with(config.env_filter())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_verbose_config() {
        let config = LogConfig::default().verbose();
        assert!(config.filter.contains("clickreplay=debug"));
        assert!(config.source_location);
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_section_from_toml() {
        let config: LogConfig = toml::from_str("format = \"json\"\nsource_location = true\n").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.source_location);
        assert_eq!(config.filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_env_overrides_configured_values() {
        // SAFETY: These env vars are only read by LogConfig::with_env, and only this test sets them
        unsafe {
            std::env::set_var(LOG_ENV, "clickreplay=trace");
            std::env::set_var(LOG_FORMAT_ENV, "compact");
        }

        let config = LogConfig {
            format: LogFormat::Json,
            ..Default::default()
        }
        .with_env();

        // SAFETY: see above
        unsafe {
            std::env::remove_var(LOG_ENV);
            std::env::remove_var(LOG_FORMAT_ENV);
        }

        assert_eq!(config.filter, "clickreplay=trace");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.source_location);
    }

    #[test]
    fn test_output_layer_builds_for_every_format() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let config = LogConfig {
                format,
                ..Default::default()
            };
            let _layer = config.output_layer();
        }
    }
}
