// ABOUTME: Configuration management for the labforge application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{default_concurrency, OrchestratorConfig, RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_concurrency")]
    pub max_concurrent_tasks: usize,

    #[serde(default = "Config::default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    #[serde(default = "Config::default_max_attempts")]
    pub default_max_attempts: u32,

    #[serde(default = "Config::default_backoff_multiplier")]
    pub default_backoff_multiplier: f64,

    #[serde(default = "Config::default_rollback_timeout_seconds")]
    pub rollback_timeout_seconds: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_concurrency(),
            default_timeout_seconds: Self::default_timeout_seconds(),
            default_max_attempts: Self::default_max_attempts(),
            default_backoff_multiplier: Self::default_backoff_multiplier(),
            rollback_timeout_seconds: Self::default_rollback_timeout_seconds(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    fn default_timeout_seconds() -> u64 {
        600
    }

    fn default_max_attempts() -> u32 {
        3
    }

    fn default_backoff_multiplier() -> f64 {
        2.0
    }

    fn default_rollback_timeout_seconds() -> u64 {
        120
    }

    /// Load configuration from a file path or default locations.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    fn find_config_file() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".labforge").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        for candidate in ["labforge.yaml", "labforge.yml", ".labforge.yaml"] {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return path;
            }
        }

        PathBuf::from("labforge.yaml")
    }

    fn merge_env(&mut self) -> Result<()> {
        if let Ok(max_tasks) = std::env::var("LABFORGE_MAX_CONCURRENT") {
            self.max_concurrent_tasks = max_tasks.parse()?;
        }
        if let Ok(timeout) = std::env::var("LABFORGE_DEFAULT_TIMEOUT") {
            self.default_timeout_seconds = timeout.parse()?;
        }
        if let Ok(attempts) = std::env::var("LABFORGE_MAX_ATTEMPTS") {
            self.default_max_attempts = attempts.parse()?;
        }
        if let Ok(level) = std::env::var("LABFORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LABFORGE_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    /// Engine configuration derived from this file/env configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent: self.max_concurrent_tasks.max(1),
            default_timeout: Duration::from_secs(self.default_timeout_seconds),
            default_retry: RetryPolicy {
                max_attempts: self.default_max_attempts,
                backoff_multiplier: self.default_backoff_multiplier,
                ..RetryPolicy::default()
            },
            rollback_timeout: Duration::from_secs(self.rollback_timeout_seconds),
            ..OrchestratorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.max_concurrent_tasks >= 1);
        assert!(config.max_concurrent_tasks <= 8);
        assert_eq!(config.default_max_attempts, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
max_concurrent_tasks: 6
default_timeout_seconds: 60
logging:
  level: debug
  format: compact
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_concurrent_tasks, 6);
        assert_eq!(config.default_timeout_seconds, 60);
        assert_eq!(config.logging.level, "debug");
        // unspecified keys fall back to serde defaults
        assert_eq!(config.default_max_attempts, 3);
    }

    #[test]
    fn test_orchestrator_config_mapping() {
        let config = Config {
            max_concurrent_tasks: 0,
            ..Config::default()
        };
        let engine = config.orchestrator_config();
        // zero concurrency is clamped up to a runnable bound
        assert_eq!(engine.max_concurrent, 1);
        assert_eq!(engine.default_retry.max_attempts, 3);
    }
}
