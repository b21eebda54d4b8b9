//! Video frame types and encoding

use crate::CameraError;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

/// Still frame encoded for transmission to the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    /// `data:image/jpeg;base64,...` URL
    pub data_url: String,
    /// Width of the encoded image
    pub width: u32,
    /// Height of the encoded image
    pub height: u32,
    /// Sequence number of the source frame
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        let px = self.data.get(idx..idx + 3)?;
        Some([px[0], px[1], px[2]])
    }

    /// Resize frame (nearest neighbour)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        let mut resized = Vec::with_capacity((new_width * new_height * 3) as usize);

        let x_ratio = self.width as f32 / new_width as f32;
        let y_ratio = self.height as f32 / new_height as f32;

        for y in 0..new_height {
            for x in 0..new_width {
                let x0 = (x as f32 * x_ratio).floor() as u32;
                let y0 = (y as f32 * y_ratio).floor() as u32;

                match self.get_pixel(x0.min(self.width.saturating_sub(1)), y0.min(self.height.saturating_sub(1))) {
                    Some(pixel) => resized.extend_from_slice(&pixel),
                    None => resized.extend_from_slice(&[0, 0, 0]),
                }
            }
        }

        VideoFrame {
            data: resized,
            width: new_width,
            height: new_height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Encode as JPEG bytes
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let expected = (self.width as usize) * (self.height as usize) * 3;
        if self.data.len() != expected || expected == 0 {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                self.width,
                self.height,
                self.data.len()
            )));
        }

        let mut buf = Vec::with_capacity(expected / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| CameraError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Resize to the target dimensions (if needed) and encode as a JPEG data URL
    pub fn encode_for_classifier(
        &self,
        target_width: u32,
        target_height: u32,
        quality: u8,
    ) -> Result<EncodedFrame, CameraError> {
        let jpeg = if self.width == target_width && self.height == target_height {
            self.encode_jpeg(quality)?
        } else {
            self.resize(target_width, target_height).encode_jpeg(quality)?
        };

        Ok(EncodedFrame {
            data_url: format!("data:image/jpeg;base64,{}", base64::encode(jpeg)),
            width: target_width,
            height: target_height,
            sequence: self.sequence,
        })
    }
}
