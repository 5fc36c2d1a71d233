use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LineError {
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("sensor fault: {0}")]
    SensorFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("channel count mismatch: expected {expected}, got {got}")]
    ChannelCount { expected: usize, got: usize },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sensor source")]
    MissingSource,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
