use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to open serial port {port}: {source}")]
    ConnectionOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial link I/O failure: {0}")]
    LinkIo(#[from] std::io::Error),
    #[error("failed to start telemetry reader thread: {0}")]
    ReaderSpawn(#[source] std::io::Error),
    #[error("serial link closed by peer")]
    LinkClosed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("failed to render snapshot: {0}")]
    Render(String),
}
