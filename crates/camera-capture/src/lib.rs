//! Camera Capture Library for the Distraction Monitor
//!
//! Provides the cabin video source abstraction used by the sampling loop.
//! Supports:
//! - Generated test-pattern source (no hardware required)
//! - Still image source (replays a single image file)
//! - JPEG / data-URL encoding of captured frames for the classifier

pub mod frame;
pub mod source;

pub use frame::{EncodedFrame, VideoFrame};
pub use source::{StillImageCamera, SyntheticCamera, VideoSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Camera access denied: {0}")]
    PermissionDenied(String),

    #[error("No video device found: {0}")]
    NoDevice(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device label (e.g., "/dev/video0"), used for logging
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
    /// Replay this image instead of generating a test pattern
    pub still_image: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
            still_image: None,
        }
    }
}

impl CameraConfig {
    /// Build the video source described by this config
    pub fn build_source(&self) -> std::sync::Arc<dyn VideoSource> {
        match &self.still_image {
            Some(path) => std::sync::Arc::new(StillImageCamera::new(path.clone())),
            None => std::sync::Arc::new(SyntheticCamera::new(self.width, self.height)),
        }
    }
}
