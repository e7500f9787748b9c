// src/drivers/mod.rs
// 数据管线：协议解析、环形缓冲、数据源、渲染驱动
pub mod buffer;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod source;
// 公开导出常用类型，方便外部调用
pub use buffer::SampleStore;
pub use error::MonitorError;
pub use pipeline::{format_elapsed, RenderDriver, TickClock};
pub use protocol::{classify_state, Severity};
pub use source::{LineSource, SerialLineSource, SimulatedSource};
