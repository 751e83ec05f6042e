//! TOML configuration for the device controllers.
//!
//! One [`ControllersConfig`] aggregates a section per device; every
//! field has a serde default so a partial (or missing) file still
//! yields a runnable configuration. `validate()` enforces parameter
//! bounds before the config reaches a controller.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::MAX_PATH;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter validation error.
    #[error("config validation: {0}")]
    Validation(String),
}

/// Volume controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Base directory for all file-level operations. Created at mount
    /// if absent.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Free-space floor [KiB]. Below this, the free-space-low fault
    /// bit is latched at mount (and on explicit check).
    #[serde(default = "default_free_space_min_kib")]
    pub free_space_min_kib: u32,
}

fn default_base_path() -> String {
    "/data".to_string()
}
fn default_free_space_min_kib() -> u32 {
    1024
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            free_space_min_kib: default_free_space_min_kib(),
        }
    }
}

/// Radio link controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Maximum payload accepted by `set_send` [bytes].
    #[serde(default = "default_payload_max")]
    pub payload_max: usize,
}

fn default_payload_max() -> usize {
    64
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            payload_max: default_payload_max(),
        }
    }
}

/// Display controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Ticks of power-save inactivity before the backlight goes off.
    #[serde(default = "default_backlight_timeout_ticks")]
    pub backlight_timeout_ticks: u32,
}

fn default_backlight_timeout_ticks() -> u32 {
    100
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backlight_timeout_ticks: default_backlight_timeout_ticks(),
        }
    }
}

/// Inertial sensor controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Ticks between samples in the resting state.
    #[serde(default = "default_sample_period_ticks")]
    pub sample_period_ticks: u32,
}

fn default_sample_period_ticks() -> u32 {
    10
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_period_ticks: default_sample_period_ticks(),
        }
    }
}

/// Receiver controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Ticks to wait for the device to answer after low-power exit
    /// before latching the wake-timeout fault.
    #[serde(default = "default_wake_timeout_ticks")]
    pub wake_timeout_ticks: u32,
    /// Start in the read-continuously resting state.
    #[serde(default = "default_continuous")]
    pub continuous: bool,
}

fn default_wake_timeout_ticks() -> u32 {
    50
}
fn default_continuous() -> bool {
    true
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            wake_timeout_ticks: default_wake_timeout_ticks(),
            continuous: default_continuous(),
        }
    }
}

/// Complete controller configuration bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllersConfig {
    /// Volume controller section.
    #[serde(default)]
    pub volume: VolumeConfig,
    /// Radio link controller section.
    #[serde(default)]
    pub link: LinkConfig,
    /// Display controller section.
    #[serde(default)]
    pub display: DisplayConfig,
    /// Inertial sensor controller section.
    #[serde(default)]
    pub sensor: SensorConfig,
    /// Receiver controller section.
    #[serde(default)]
    pub receiver: ReceiverConfig,
}

impl ControllersConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.volume.base_path;
        if base.is_empty() || !base.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "volume.base_path '{base}' must be absolute"
            )));
        }
        if base.len() > 1 && base.ends_with('/') {
            return Err(ConfigError::Validation(
                "volume.base_path must not end with '/'".to_string(),
            ));
        }
        // Leave headroom for "/<subdir>/<name>".
        if base.len() > MAX_PATH / 2 {
            return Err(ConfigError::Validation(format!(
                "volume.base_path exceeds {} characters",
                MAX_PATH / 2
            )));
        }
        if self.link.payload_max == 0 || self.link.payload_max > 64 {
            return Err(ConfigError::Validation(format!(
                "link.payload_max {} out of range 1..=64",
                self.link.payload_max
            )));
        }
        if self.display.backlight_timeout_ticks == 0 {
            return Err(ConfigError::Validation(
                "display.backlight_timeout_ticks must be > 0".to_string(),
            ));
        }
        if self.sensor.sample_period_ticks == 0 {
            return Err(ConfigError::Validation(
                "sensor.sample_period_ticks must be > 0".to_string(),
            ));
        }
        if self.receiver.wake_timeout_ticks == 0 {
            return Err(ConfigError::Validation(
                "receiver.wake_timeout_ticks must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a controller configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ControllersConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    ControllersConfig::from_toml(&toml_str)
}
