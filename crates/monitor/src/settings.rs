//! Pipeline configuration
//!
//! Every section has defaults, so an empty environment yields a working
//! setup. Values come from an optional TOML file, then `DRIVER_MONITOR__*`
//! environment variables (`DRIVER_MONITOR__SAMPLER__MIN_SAMPLE_GAP_MS=750`).

use alerting::EscalationConfig;
use camera_capture::CameraConfig;
use dms::DetectionConfig;
use emergency::ProtocolConfig;
use frame_classifier::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const ENV_PREFIX: &str = "DRIVER_MONITOR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Sampling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Scheduler tick (default: 16ms, ~60 Hz)
    pub tick_interval_ms: u64,
    /// Minimum time between classification request starts
    pub min_sample_gap_ms: u64,
    /// Frame size expected by the classifier
    pub target_width: u32,
    pub target_height: u32,
    /// JPEG quality 1-100
    pub jpeg_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            min_sample_gap_ms: 500,
            target_width: 640,
            target_height: 480,
            jpeg_quality: 70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Start the sampling loop as soon as the service is up
    pub auto_start: bool,
    /// Control endpoint quota replenishment (seconds per request)
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            auto_start: false,
            rate_limit_per_second: 2,
            rate_limit_burst: 5,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub classifier: ClassifierConfig,
    pub detection: DetectionConfig,
    pub escalation: EscalationConfig,
    pub protocol: ProtocolConfig,
    pub sampler: SamplerConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

impl MonitorConfig {
    /// Load from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let loaded: MonitorConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sampler = &self.sampler;
        if sampler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("sampler.tick_interval_ms must be > 0".into()));
        }
        if sampler.target_width == 0 || sampler.target_height == 0 {
            return Err(ConfigError::Invalid("sampler target size must be non-zero".into()));
        }
        if !(1..=100).contains(&sampler.jpeg_quality) {
            return Err(ConfigError::Invalid("sampler.jpeg_quality must be 1-100".into()));
        }

        let detection = &self.detection;
        if !(0.0..=1.0).contains(&detection.min_score)
            || !(0.0..=1.0).contains(&detection.high_score)
            || detection.min_score > detection.high_score
        {
            return Err(ConfigError::Invalid(format!(
                "detection thresholds out of order: min {} high {}",
                detection.min_score, detection.high_score
            )));
        }
        if detection.history_capacity == 0 {
            return Err(ConfigError::Invalid("detection.history_capacity must be > 0".into()));
        }

        if self.escalation.threshold == 0 {
            return Err(ConfigError::Invalid("escalation.threshold must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.classifier.fallback_probability) {
            return Err(ConfigError::Invalid("classifier.fallback_probability must be in [0, 1]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampler.min_sample_gap_ms, 500);
        assert_eq!(config.sampler.jpeg_quality, 70);
        assert_eq!(config.escalation.threshold, 3);
        assert_eq!(config.classifier.request_timeout_ms, 5000);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("driver-monitor-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[classifier]
base_url = "http://detector.local:5000"
fallback_enabled = false

[protocol]
contacts = ["Alex", "Sam"]
eta_minutes = 5

[escalation]
policy = "on_crossing"
"#
        )
        .unwrap();

        let config = MonitorConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.classifier.base_url, "http://detector.local:5000");
        assert!(!config.classifier.fallback_enabled);
        assert_eq!(config.protocol.contacts, vec!["Alex", "Sam"]);
        assert_eq!(config.protocol.eta_minutes, 5);
        assert_eq!(config.escalation.policy, alerting::TriggerPolicy::OnCrossing);
        // untouched sections keep defaults
        assert_eq!(config.detection.history_capacity, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("driver-monitor-does-not-exist.toml");
        assert!(matches!(MonitorConfig::load(Some(&path)), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("DRIVER_MONITOR__SERVER__BIND_ADDR", "127.0.0.1:9999");
        let config = MonitorConfig::load(None).unwrap();
        std::env::remove_var("DRIVER_MONITOR__SERVER__BIND_ADDR");
        assert_eq!(config.server.bind_addr, "127.0.0.1:9999");
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let mut config = MonitorConfig::default();
        config.detection.min_score = 0.9;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
