use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub heartbeats: Vec<HeartbeatConfig>,
}

/// What `register` does when a live loop already holds the identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateIdentifier`
    #[default]
    Reject,
    /// Stop the old loop and install the new one without waiting for the old task
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grace_period_ms: u64,
    pub duplicate_policy: DuplicatePolicy,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
            duplicate_policy: DuplicatePolicy::Reject,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// A logging loop started by `loopwarden run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub id: String,
    pub period_ms: u64,
    pub initial_delay_ms: u64,
    pub message: String,
    /// Fail every n-th beat (0 = never), to exercise error reporting
    pub fail_every: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            id: "heartbeat".to_string(),
            period_ms: 1000,
            initial_delay_ms: 0,
            message: "alive".to_string(),
            fail_every: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            heartbeats: vec![HeartbeatConfig::default()],
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir
                .join(project_name)
                .join(format!("{}.yml", project_name));
            if let Some(config) = Self::try_load(&primary_config) {
                return Ok(config);
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if let Some(config) = Self::try_load(&fallback_config) {
            return Ok(config);
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn try_load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config from {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::default()
            .with_grace_period(Duration::from_millis(250))
            .with_duplicate_policy(DuplicatePolicy::Replace)
            .with_event_capacity(16);
        assert_eq!(config.grace_period_ms, 250);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.event_capacity, 16);
    }

    #[test]
    fn test_default_config_has_one_heartbeat() {
        let config = Config::default();
        assert_eq!(config.heartbeats.len(), 1);
        assert_eq!(config.heartbeats[0].id, "heartbeat");
    }

    #[test]
    fn test_load_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("loopwarden.yml");
        fs::write(
            &path,
            r#"
engine:
  grace_period_ms: 100
  duplicate_policy: replace
heartbeats:
  - id: ping
    period_ms: 50
  - id: pong
    period_ms: 75
    fail_every: 3
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.engine.grace_period_ms, 100);
        assert_eq!(config.engine.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.engine.event_capacity, 256);
        assert_eq!(config.heartbeats.len(), 2);
        assert_eq!(config.heartbeats[0].message, "alive");
        assert_eq!(config.heartbeats[1].fail_every, 3);
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.yml");
        fs::write(&path, "engine: [not, a, map]").unwrap();
        assert!(Config::load_from_file(&path).is_err());
    }
}
