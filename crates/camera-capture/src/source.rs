//! Video sources
//!
//! A source is acquired once when monitoring starts and released when it
//! stops. `release` is idempotent so every exit path may call it.

use crate::{CameraError, VideoFrame};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Cabin video source
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Open the device. Fails with `PermissionDenied` / `NoDevice` when unusable.
    async fn acquire(&self) -> Result<(), CameraError>;

    /// Grab the current frame
    async fn capture(&self) -> Result<VideoFrame, CameraError>;

    /// Release the device. Returns `false` if it was not held.
    fn release(&self) -> bool;

    /// Whether the device is currently held
    fn is_acquired(&self) -> bool;
}

fn timestamp_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Generated test-pattern source
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    acquired: AtomicBool,
    sequence: AtomicU32,
    acquire_failure: Mutex<Option<CameraError>>,
    acquisitions: AtomicU32,
    releases: AtomicU32,
}

impl SyntheticCamera {
    /// Create a synthetic camera producing `width`x`height` frames
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            acquired: AtomicBool::new(false),
            sequence: AtomicU32::new(0),
            acquire_failure: Mutex::new(None),
            acquisitions: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        }
    }

    /// Make every subsequent `acquire` fail with `error`
    pub fn fail_acquire_with(&self, error: CameraError) {
        *self.acquire_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    /// Number of successful acquisitions
    pub fn acquisitions(&self) -> u32 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of releases that actually released the device
    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    fn pattern(&self, sequence: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        let shift = (sequence % 256) as u8;
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x * 255) / self.width.max(1)) as u8);
                data.push(((y * 255) / self.height.max(1)) as u8);
                data.push(shift);
            }
        }
        data
    }
}

#[async_trait]
impl VideoSource for SyntheticCamera {
    async fn acquire(&self) -> Result<(), CameraError> {
        if let Some(err) = self.acquire_failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            warn!("Synthetic camera acquisition failing: {}", err);
            return Err(err);
        }
        if !self.acquired.swap(true, Ordering::SeqCst) {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            info!("Synthetic camera acquired ({}x{})", self.width, self.height);
        }
        Ok(())
    }

    async fn capture(&self) -> Result<VideoFrame, CameraError> {
        if !self.acquired.load(Ordering::SeqCst) {
            return Err(CameraError::NotInitialized);
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(VideoFrame::new(
            self.pattern(sequence),
            self.width,
            self.height,
            timestamp_ns(),
            sequence,
        ))
    }

    fn release(&self) -> bool {
        let was_held = self.acquired.swap(false, Ordering::SeqCst);
        if was_held {
            self.releases.fetch_add(1, Ordering::SeqCst);
            info!("Synthetic camera released");
        }
        was_held
    }

    fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }
}

/// Replays a single image file as the video feed
pub struct StillImageCamera {
    path: PathBuf,
    frame: Mutex<Option<VideoFrame>>,
    sequence: AtomicU32,
}

impl StillImageCamera {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            frame: Mutex::new(None),
            sequence: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl VideoSource for StillImageCamera {
    async fn acquire(&self) -> Result<(), CameraError> {
        if self.is_acquired() {
            return Ok(());
        }

        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CameraError::Open(e.to_string()))?;

        let img = match loaded {
            Ok(img) => img.to_rgb8(),
            Err(image::ImageError::IoError(e)) => {
                return Err(match e.kind() {
                    std::io::ErrorKind::NotFound => CameraError::NoDevice(self.path.display().to_string()),
                    std::io::ErrorKind::PermissionDenied => {
                        CameraError::PermissionDenied(self.path.display().to_string())
                    }
                    _ => CameraError::Open(e.to_string()),
                })
            }
            Err(e) => return Err(CameraError::Format(e.to_string())),
        };

        let (width, height) = img.dimensions();
        info!("Still image source {} acquired ({}x{})", self.path.display(), width, height);
        *self.frame.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(VideoFrame::new(img.into_raw(), width, height, 0, 0));
        Ok(())
    }

    async fn capture(&self) -> Result<VideoFrame, CameraError> {
        let guard = self.frame.lock().unwrap_or_else(|e| e.into_inner());
        let mut frame = guard.clone().ok_or(CameraError::NotInitialized)?;
        frame.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        frame.timestamp_ns = timestamp_ns();
        Ok(frame)
    }

    fn release(&self) -> bool {
        let released = self.frame.lock().unwrap_or_else(|e| e.into_inner()).take().is_some();
        if released {
            debug!("Still image source released");
        }
        released
    }

    fn is_acquired(&self) -> bool {
        self.frame.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_requires_acquire() {
        let camera = SyntheticCamera::new(32, 24);
        assert_eq!(camera.capture().await.unwrap_err(), CameraError::NotInitialized);

        camera.acquire().await.unwrap();
        let frame = camera.capture().await.unwrap();
        assert_eq!(frame.data.len(), 32 * 24 * 3);
        assert_eq!(camera.capture().await.unwrap().sequence, frame.sequence + 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let camera = SyntheticCamera::new(8, 8);
        camera.acquire().await.unwrap();

        assert!(camera.release());
        assert!(!camera.release());
        assert_eq!(camera.releases(), 1);
        assert!(!camera.is_acquired());
    }

    #[tokio::test]
    async fn test_acquire_failure() {
        let camera = SyntheticCamera::new(8, 8);
        camera.fail_acquire_with(CameraError::PermissionDenied("denied".into()));

        assert!(matches!(camera.acquire().await, Err(CameraError::PermissionDenied(_))));
        assert_eq!(camera.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_still_image_missing_file() {
        let camera = StillImageCamera::new(PathBuf::from("/nonexistent/cabin.png"));
        assert!(matches!(camera.acquire().await, Err(CameraError::NoDevice(_))));
        assert!(!camera.is_acquired());
        assert!(!camera.release());
    }
}
