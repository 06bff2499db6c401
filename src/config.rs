use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::DriftPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Product policy knobs. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub idle_threshold_minutes: i64,
    pub drift_ratio: f64,
    pub drift_floor_seconds: i64,
    pub min_checked_seconds: i64,
    pub error_display_seconds: i64,
    pub tick_millis: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let drift = DriftPolicy::default();
        Self {
            idle_threshold_minutes: 30,
            drift_ratio: drift.ratio,
            drift_floor_seconds: drift.floor_seconds,
            min_checked_seconds: drift.min_checked_seconds,
            error_display_seconds: 5,
            tick_millis: 1000,
        }
    }
}

impl Settings {
    pub fn idle_threshold(&self) -> Duration {
        Duration::minutes(self.idle_threshold_minutes)
    }

    pub fn error_display(&self) -> Duration {
        Duration::seconds(self.error_display_seconds)
    }

    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.tick_millis)
    }

    pub fn drift_policy(&self) -> DriftPolicy {
        DriftPolicy {
            min_checked_seconds: self.min_checked_seconds,
            ratio: self.drift_ratio,
            floor_seconds: self.drift_floor_seconds,
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.idle_threshold_minutes <= 0 {
            return Err(ConfigError::Invalid("idle_threshold_minutes must be positive".to_string()));
        }
        if !self.drift_ratio.is_finite() || self.drift_ratio < 0.0 {
            return Err(ConfigError::Invalid("drift_ratio must be a non-negative number".to_string()));
        }
        if self.drift_floor_seconds < 0 || self.min_checked_seconds < 0 {
            return Err(ConfigError::Invalid(
                "drift_floor_seconds and min_checked_seconds must not be negative".to_string(),
            ));
        }
        if self.error_display_seconds < 0 {
            return Err(ConfigError::Invalid("error_display_seconds must not be negative".to_string()));
        }
        if self.tick_millis == 0 {
            return Err(ConfigError::Invalid("tick_millis must be positive".to_string()));
        }
        Ok(())
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let settings: Settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.check()?;
    Ok(settings)
}
