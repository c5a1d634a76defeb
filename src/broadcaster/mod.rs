//! Broadcaster: configuration and worker supervision

pub mod config;
pub mod supervisor;

pub use config::{PressureConfig, DEFAULT_DELAY, DEFAULT_STOP_GRACE_PERIOD};
pub use supervisor::{PipelineState, Pressure};
