// src/types.rs
use crate::drivers::protocol::ESD_ACTIVE_TOKEN;
use crate::drivers::MonitorError;

// 绘图用的压力/温度对，也是补点时保持的最后值
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    pub pressure: f64,
    pub temperature: f64,
}

// 一行遥测解码后的全部字段
#[derive(Clone, Debug, PartialEq)]
pub struct SampleFields {
    pub reading: Reading,
    pub valve_opening: f64,
    pub superheat: f64,
    pub flow_mode: String,
    pub control_mode: String,
    pub emergency_shutdown: String,
    pub system_state: String,
    pub relief_valve: String,
    pub purge_valve: String,
}

impl SampleFields {
    pub fn esd_active(&self) -> bool {
        self.emergency_shutdown == ESD_ACTIVE_TOKEN
    }
}

// 环形缓冲区里的一个槽位
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlotPoint {
    pub relative_time: f64, // 距第一个真实样本的秒数
    pub pressure: f64,
    pub temperature: f64,
    pub synthetic: bool,
}

/// Chronological series handed to the plotting side, with the x-axis bounds to show.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesFrame {
    pub times: Vec<f64>,
    pub pressures: Vec<f64>,
    pub temperatures: Vec<f64>,
    pub x_min: f64,
    pub x_max: f64,
}

impl SeriesFrame {
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Receives label-worthy events from the reader thread.
///
/// Called on the reader thread; implementations that drive a UI must marshal
/// onto the UI thread themselves.
pub trait SampleListener: Send {
    fn on_sample(&self, fields: &SampleFields);
    fn on_link_lost(&self, reason: &str);
}

/// Receives a fresh snapshot whenever the store changed since the last render.
pub trait PlotSink {
    fn on_snapshot_ready(&mut self, frame: &SeriesFrame) -> Result<(), MonitorError>;
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum TelemetryEvent {
    Sample(SampleFields),
    LinkLost(String),
}
