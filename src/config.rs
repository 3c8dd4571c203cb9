use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::logging::LogConfig;
use crate::workflow::DEFAULT_TARGET;

/// Environment override for `server.listen`.
pub const LISTEN_ENV: &str = "CLICKREPLAY_LISTEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineSection,
    pub browser: BrowserOptions,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP surface binds to
    pub listen: String,
    /// Expose /metrics
    pub metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
            metrics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Gap between typed characters at speed 1
    pub base_char_delay_ms: u64,
    /// Seconds a finished session stays open before teardown
    pub teardown_grace_secs: u64,
    /// Failed-step ratio above which a completed run is reported as failed
    pub failure_threshold: Option<f64>,
    /// Target for submissions that carry no url
    pub default_url: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            base_char_delay_ms: 50,
            teardown_grace_secs: 30,
            failure_threshold: None,
            default_url: DEFAULT_TARGET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Chromium binary; auto-detected when unset
    pub executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl Config {
    /// `~/.clickreplay/config.toml`
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".clickreplay").join("config.toml")
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = path.unwrap_or_else(Self::default_path);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(listen) = std::env::var(LISTEN_ENV) {
            if !listen.trim().is_empty() {
                self.server.listen = listen.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.engine.failure_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                anyhow::bail!(
                    "engine.failure_threshold must be between 0 and 1, got {}",
                    threshold
                );
            }
        }
        self.server
            .listen
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid server.listen address: {}", self.server.listen))?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            base_char_delay: Duration::from_millis(self.engine.base_char_delay_ms),
            teardown_grace: Duration::from_secs(self.engine.teardown_grace_secs),
            failure_threshold: self.engine.failure_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.engine.base_char_delay_ms, 50);
        assert_eq!(config.engine.teardown_grace_secs, 30);
        assert_eq!(config.engine.default_url, "about:blank");
        assert!(config.browser.headless);
    }

    #[test]
    fn loads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[engine]
teardown_grace_secs = 5
failure_threshold = 0.25

[browser]
headless = false
"#,
        )
        .unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.engine.teardown_grace_secs, 5);
        assert_eq!(config.engine.failure_threshold, Some(0.25));
        assert_eq!(config.engine.base_char_delay_ms, 50);
        assert!(!config.browser.headless);

        let engine = config.engine_config();
        assert_eq!(engine.teardown_grace, Duration::from_secs(5));
        assert_eq!(engine.base_char_delay, Duration::from_millis(50));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\nfailure_threshold = 1.5\n").unwrap();
        let err = Config::load(Some(path)).unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));
    }

    #[test]
    fn save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.engine.teardown_grace_secs = 7;
        config.server.metrics = false;
        config.log.format = LogFormat::Json;
        config.save(Some(path.clone())).unwrap();

        let loaded = Config::load(Some(path)).unwrap();
        assert_eq!(loaded.engine.teardown_grace_secs, 7);
        assert!(!loaded.server.metrics);
        assert_eq!(loaded.log.format, LogFormat::Json);
    }

    #[test]
    fn listen_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nlisten = \"127.0.0.1:9000\"\n").unwrap();

        // SAFETY: CLICKREPLAY_LISTEN is only set by this test, and no other test here
        // asserts on server.listen
        unsafe {
            std::env::set_var(LISTEN_ENV, " 0.0.0.0:9911 ");
        }
        let overridden = Config::load(Some(path.clone()));

        // SAFETY: see above
        unsafe {
            std::env::set_var(LISTEN_ENV, "");
        }
        let blank = Config::load(Some(path.clone()));

        // SAFETY: see above
        unsafe {
            std::env::remove_var(LISTEN_ENV);
        }
        let unset = Config::load(Some(path)).unwrap();

        assert_eq!(overridden.unwrap().server.listen, "0.0.0.0:9911");
        assert_eq!(blank.unwrap().server.listen, "127.0.0.1:9000");
        assert_eq!(unset.server.listen, "127.0.0.1:9000");
    }
}
