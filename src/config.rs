// Configuration save/restore

use crate::engine::EngineConfig;
use crate::history::DEFAULT_CAPACITY;
use crate::render::ChartStyle;
use crate::scale::ScaleConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "trafficgraph";
const CONFIG_FILE: &str = "config.json";

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Points kept in the rolling window
    pub capacity: usize,

    /// Sampling period
    pub tick_interval_ms: u64,

    pub resize_debounce_ms: u64,

    pub scale: ScaleConfig,

    /// Interfaces hidden when last seen; they start hidden again
    pub hidden_interfaces: Vec<String>,

    /// Preferred counter source (procfs, sysinfo)
    pub source: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            tick_interval_ms: 1000,
            resize_debounce_ms: 250,
            scale: ScaleConfig::default(),
            hidden_interfaces: Vec::new(),
            source: None,
        }
    }
}

/// One-off settings from the command line. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub capacity: Option<usize>,
    pub tick_interval_ms: Option<u64>,
    pub source: Option<String>,
}

impl Config {
    /// Settings for this run: the stored config with `overrides` applied on top
    pub fn with_overrides(&self, overrides: &Overrides) -> Config {
        let mut effective = self.clone();
        if let Some(capacity) = overrides.capacity {
            effective.capacity = capacity;
        }
        if let Some(interval_ms) = overrides.tick_interval_ms {
            effective.tick_interval_ms = interval_ms;
        }
        if overrides.source.is_some() {
            effective.source = overrides.source.clone();
        }
        effective
    }

    /// Get the config file path, creating its directory
    pub fn config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine the config directory")?;
        let config_dir = base.join(CONFIG_DIR);

        fs::create_dir_all(&config_dir).context(format!(
            "Failed to create config directory: {:?}",
            config_dir
        ))?;

        Ok(config_dir.join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let contents =
            fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;

        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context(format!("Failed to write config file: {:?}", path))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Engine settings for a chart drawn with `style`
    pub fn engine_config(&self, style: ChartStyle) -> EngineConfig {
        EngineConfig {
            capacity: self.capacity,
            resize_debounce: Duration::from_millis(self.resize_debounce_ms),
            scale: self.scale,
            style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.capacity = 60;
        config.hidden_interfaces = vec!["lo".to_string()];
        config.source = Some("sysinfo".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"hidden_interfaces": ["wlan0"], "scale": {"floor": 8000.0}}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.capacity, 30);
        assert_eq!(loaded.tick_interval(), Duration::from_secs(1));
        assert_eq!(loaded.hidden_interfaces, vec!["wlan0"]);
        assert_eq!(loaded.scale.floor, 8000.0);
        assert_eq!(loaded.scale.headroom, 1.2);

        let engine = loaded.engine_config(ChartStyle::terminal());
        assert_eq!(engine.resize_debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_overrides_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut stored = Config::default();
        stored.source = Some("procfs".to_string());
        let overrides = Overrides {
            capacity: Some(120),
            tick_interval_ms: Some(250),
            source: Some("sysinfo".to_string()),
        };

        let effective = stored.with_overrides(&overrides);
        assert_eq!(effective.capacity, 120);
        assert_eq!(effective.tick_interval(), Duration::from_millis(250));
        assert_eq!(effective.source.as_deref(), Some("sysinfo"));

        stored.hidden_interfaces = vec!["docker0".to_string()];
        stored.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.capacity, 30);
        assert_eq!(loaded.tick_interval_ms, 1000);
        assert_eq!(loaded.source.as_deref(), Some("procfs"));
        assert_eq!(loaded.hidden_interfaces, vec!["docker0"]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
