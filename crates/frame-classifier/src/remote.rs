//! HTTP client for the detection service

use crate::wire::{decode_classify_response, ClassifyRequest, HealthResponse};
use crate::{ClassifierConfig, ClassifierError, Detection, FrameClassifier, HealthStatus};
use async_trait::async_trait;
use camera_capture::EncodedFrame;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Detection service reached over HTTP/JSON
pub struct HttpClassifier {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpClassifier {
    /// Create a client for the service at `config.base_url`
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.request_timeout_ms,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClassifierError {
        if e.is_timeout() {
            ClassifierError::Timeout(self.timeout_ms)
        } else {
            ClassifierError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl FrameClassifier for HttpClassifier {
    async fn classify(&self, frame: &EncodedFrame) -> Result<Vec<Detection>, ClassifierError> {
        let url = format!("{}/api/detect-phone", self.base_url);
        debug!("Sending frame {} to {}", frame.sequence, url);

        let response = self
            .client
            .post(&url)
            .json(&ClassifyRequest {
                image_data: frame.data_url.clone(),
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            let message = match decode_classify_response(&body) {
                Err(ClassifierError::Remote(msg)) => msg,
                _ => String::from_utf8_lossy(&body).chars().take(200).collect(),
            };
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                message,
            });
        }

        decode_classify_response(&body)
    }

    async fn health_check(&self) -> Result<HealthStatus, ClassifierError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                message: "health probe failed".to_string(),
            });
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        Ok(health.into())
    }
}
