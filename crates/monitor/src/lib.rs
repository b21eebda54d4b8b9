//! Distraction Monitor Pipeline
//!
//! Samples the cabin camera, classifies frames, derives the driver's
//! distraction state and escalates repeated drowsiness to the emergency
//! protocol. Everything is reported through a [`NotificationSink`].

mod error;
mod monitor;
pub mod sampler;
pub mod settings;
pub mod sink;

pub use error::MonitorError;
pub use monitor::{DriverMonitor, MonitorStatus};
pub use sampler::FrameSampler;
pub use settings::{ConfigError, LoggingConfig, MonitorConfig, SamplerConfig, ServerConfig};
pub use sink::{DashboardSnapshot, DetectionReport, FanoutSink, MemorySink, NotificationSink, TracingSink};
