use camera_capture::CameraError;
use emergency::ProtocolError;
use frame_classifier::ClassifierError;
use thiserror::Error;

use crate::settings::ConfigError;

#[derive(Error, Debug)]
pub enum MonitorError {
    /// Shown to the driver when monitoring cannot start
    #[error("Could not access video source: {0}")]
    VideoSourceUnavailable(#[from] CameraError),

    #[error("Classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Emergency protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
