use anyhow::{anyhow, Context, Result};
use nowplaying_core::ComponentName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "nowplaying-bridge";
const CONFIG_FILE: &str = "config.toml";

/// Bridge settings, read from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Flattened `package/class` of the notification listener the sessions
    /// are requested for
    pub listener_component: String,
    /// Upper bound for one OS call before answering with "no session"
    pub call_timeout_ms: u64,
    /// Used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Also write daily-rolling log files here
    pub log_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listener_component: "cc.koto.fluent_lyrics/.MediaSessionListenerService".to_string(),
            call_timeout_ms: 2000,
            log_filter: "info,nowplaying=debug".to_string(),
            log_dir: None,
        }
    }
}

impl BridgeConfig {
    /// `<config dir>/nowplaying-bridge/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Failed to get config directory"))?
            .join(CONFIG_DIR);
        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.listener()?;
        if self.call_timeout_ms == 0 {
            return Err(anyhow!("call_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn listener(&self) -> Result<ComponentName> {
        self.listener_component
            .parse()
            .map_err(|e| anyhow!("listener_component {:?}: {}", self.listener_component, e))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "call_timeout_ms = 500").unwrap();
        writeln!(file, "listener_component = \"com.example/.Listener\"").unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.call_timeout(), Duration::from_millis(500));
        assert_eq!(config.listener().unwrap().class, "com.example.Listener");
        assert_eq!(config.log_filter, BridgeConfig::default().log_filter);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listener_component = \"not-a-component\"").unwrap();
        assert!(BridgeConfig::load(file.path()).is_err());

        let config = BridgeConfig {
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = BridgeConfig {
            log_dir: Some(PathBuf::from("/tmp/nowplaying-logs")),
            ..Default::default()
        };
        let parsed: BridgeConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
