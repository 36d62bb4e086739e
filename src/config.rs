//! Configuration for the exam proctor.

use crate::core::exam::duration_secs;
use crate::core::SessionSettings;
use crate::risk::RiskWeights;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "exam-proctor";

/// Main configuration for the proctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Exam length used when the exam file does not override it
    #[serde(with = "duration_secs")]
    pub exam_duration: Duration,

    /// Cadence of the integrity alert sampler
    #[serde(with = "duration_secs")]
    pub alert_interval: Duration,

    /// Chance that a sampling cycle raises an alert
    pub alert_probability: f64,

    /// Alerts kept on screen
    pub visible_alerts: usize,

    /// Keystrokes retained in the submission
    pub keystroke_capacity: usize,

    /// How often the runner polls the session (milliseconds)
    pub poll_interval_ms: u64,

    /// Where submissions are written
    pub export_path: PathBuf,

    /// Where the audit log is kept
    pub data_path: PathBuf,

    /// Risk scoring weights
    pub risk: RiskWeights,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            exam_duration: Duration::from_secs(3600),
            alert_interval: Duration::from_secs(5),
            alert_probability: 0.1,
            visible_alerts: 3,
            keystroke_capacity: 20,
            poll_interval_ms: 100,
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            risk: RiskWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alert_probability) {
            return Err(ConfigError::Invalid(format!(
                "alert_probability must be between 0 and 1, got {}",
                self.alert_probability
            )));
        }
        if self.alert_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "alert_interval must be at least one second".to_string(),
            ));
        }
        self.session_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        self.risk
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// The knobs a session is built with.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            alert_interval: self.alert_interval,
            visible_alerts: self.visible_alerts,
            keystroke_capacity: self.keystroke_capacity,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Path of the persisted audit log.
    pub fn audit_path(&self) -> PathBuf {
        self.data_path.join("audit.json")
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
