// src/config.rs
// Runtime configuration loaded from sprinkler.yml

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SprinklerError};

pub const DEFAULT_CONFIG_PATH: &str = "./sprinkler.yml";

/// Highest header pin on the board.
const MAX_PIN: u8 = 40;

/// Where a loaded config came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SprinklerConfig {
    pub product_id: i64,
    pub valve_pin: u8,
    pub update_interval_seconds: u64,
    pub connection_ping_interval_seconds: u64,
    pub heart_beat_interval_seconds: u64,
    pub database_path: PathBuf,
    pub flow_sensor: FlowSensorConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowSensorConfig {
    /// Flow sensing is skipped entirely when no pin is set.
    pub pin: Option<u8>,
    pub pulses_per_litre: f64,
    pub save_interval_seconds: u64,
    /// Litres
    pub min_flow_volume_for_save: f64,
    /// Seconds
    pub max_flow_duration_for_save: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

impl Default for SprinklerConfig {
    fn default() -> Self {
        Self {
            product_id: 1,
            valve_pin: 40,
            update_interval_seconds: 10,
            connection_ping_interval_seconds: 20,
            heart_beat_interval_seconds: 60,
            database_path: PathBuf::from("./db/sprinkler.db"),
            flow_sensor: FlowSensorConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FlowSensorConfig {
    fn default() -> Self {
        Self {
            pin: None,
            pulses_per_litre: 365.0,
            save_interval_seconds: 10,
            min_flow_volume_for_save: 0.1,
            max_flow_duration_for_save: 3600.0,
        }
    }
}

impl SprinklerConfig {
    /// Load from a YAML file. A missing file means "all defaults". Nothing is
    /// logged here since this runs before the subscriber is installed.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }

        let contents = std::fs::read_to_string(path)?;
        Ok((Self::from_yaml(&contents)?, ConfigSource::File))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SprinklerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.valve_pin > MAX_PIN {
            return Err(SprinklerError::Config(format!(
                "valve_pin {} is outside 0..={}",
                self.valve_pin, MAX_PIN
            )));
        }

        if self.update_interval_seconds == 0 {
            return Err(SprinklerError::Config("update_interval_seconds must be positive".into()));
        }

        if self.connection_ping_interval_seconds == 0 {
            return Err(SprinklerError::Config(
                "connection_ping_interval_seconds must be positive".into(),
            ));
        }

        if self.heart_beat_interval_seconds == 0 {
            return Err(SprinklerError::Config("heart_beat_interval_seconds must be positive".into()));
        }

        if let Some(pin) = self.flow_sensor.pin {
            if pin > MAX_PIN {
                return Err(SprinklerError::Config(format!(
                    "flow_sensor.pin {} is outside 0..={}",
                    pin, MAX_PIN
                )));
            }
            if pin == self.valve_pin {
                return Err(SprinklerError::Config("flow_sensor.pin and valve_pin must differ".into()));
            }
        }

        if self.flow_sensor.pulses_per_litre <= 0.0 {
            return Err(SprinklerError::Config("flow_sensor.pulses_per_litre must be positive".into()));
        }

        if self.flow_sensor.save_interval_seconds == 0 {
            return Err(SprinklerError::Config(
                "flow_sensor.save_interval_seconds must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn connection_ping_interval(&self) -> Duration {
        Duration::from_secs(self.connection_ping_interval_seconds)
    }

    pub fn heart_beat_interval(&self) -> Duration {
        Duration::from_secs(self.heart_beat_interval_seconds)
    }
}

impl FlowSensorConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_seconds)
    }
}
