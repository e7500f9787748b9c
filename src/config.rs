// src/config.rs
use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use crate::drivers::MonitorError;

/// Reference lines and bands drawn behind the live series. Display only.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub pressure_warn_high: f64,
    pub pressure_emergency_high: f64,
    pub pressure_warn_low: f64,
    pub pressure_recovery: f64,
    pub temperature_warn_high: f64,
    pub temperature_emergency_high: f64,
    pub temperature_warn_low: f64,
    pub temperature_preheat: f64,
    pub flow_a_pressure: [f64; 2],
    pub flow_a_temperature: [f64; 2],
    pub flow_b_pressure: [f64; 2],
    pub flow_b_temperature: [f64; 2],
    pub pressure_axis: [f64; 2],
    pub temperature_axis: [f64; 2],
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pressure_warn_high: 380.0,
            pressure_emergency_high: 460.0,
            pressure_warn_low: 250.0,
            pressure_recovery: 220.0,
            temperature_warn_high: 170.0,
            temperature_emergency_high: 190.0,
            temperature_warn_low: 120.0,
            temperature_preheat: 110.0,
            flow_a_pressure: [310.0, 350.0],
            flow_a_temperature: [140.0, 160.0],
            flow_b_pressure: [260.0, 300.0],
            flow_b_temperature: [160.0, 170.0],
            pressure_axis: [150.0, 500.0],
            temperature_axis: [80.0, 220.0],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Ring size; with `interval_ms` this fixes the visible window.
    pub capacity: usize,
    /// Expected spacing of controller lines, also the spacing of held points.
    pub interval_ms: u64,
    pub tick_ms: u64,
    pub thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        // 200 点 * 100ms = 20 秒窗口
        Self {
            port: None,
            baud_rate: 115_200,
            read_timeout_ms: 1_000,
            capacity: 200,
            interval_ms: 100,
            tick_ms: 50,
            thresholds: Thresholds::default(),
        }
    }
}

/// What the reader needs to open the controller link.
#[derive(Clone, Debug, PartialEq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl MonitorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let raw = fs::read_to_string(path).map_err(|source| MonitorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let checks = [
            (self.capacity == 0, "capacity must be greater than zero"),
            (self.interval_ms == 0, "interval_ms must be greater than zero"),
            (self.tick_ms == 0, "tick_ms must be greater than zero"),
            (self.read_timeout_ms == 0, "read_timeout_ms must be greater than zero"),
            (self.baud_rate == 0, "baud_rate must be greater than zero"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(MonitorError::InvalidConfig((*reason).into())),
            None => Ok(()),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn window_secs(&self) -> f64 {
        self.capacity as f64 * self.interval().as_secs_f64()
    }

    pub fn serial_settings(&self) -> Result<SerialSettings, MonitorError> {
        let port = self
            .port
            .clone()
            .ok_or_else(|| MonitorError::InvalidConfig("no serial port configured".into()))?;
        Ok(SerialSettings {
            port,
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout(),
        })
    }
}
