//! JSON wire format of the detection service

use crate::{BoundingBox, ClassifierError, Detection, HealthStatus};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/detect-phone`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    #[serde(rename = "imageData")]
    pub image_data: String,
}

/// One detection as sent by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDetection {
    /// `[x, y, width, height]`
    pub bbox: Vec<f64>,
    pub class: String,
    pub score: f64,
}

/// Body returned by `POST /api/detect-phone`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassifyResponse {
    Detections {
        detections: Vec<WireDetection>,
        #[serde(default)]
        timestamp: i64,
    },
    Error {
        error: String,
    },
}

/// Body returned by `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(rename = "modelLoaded", default)]
    pub model_loaded: bool,
}

impl From<HealthResponse> for HealthStatus {
    fn from(r: HealthResponse) -> Self {
        Self {
            status: r.status,
            model_loaded: r.model_loaded,
        }
    }
}

impl TryFrom<WireDetection> for Detection {
    type Error = ClassifierError;

    fn try_from(w: WireDetection) -> Result<Self, Self::Error> {
        let [x, y, width, height] = <[f64; 4]>::try_from(w.bbox.as_slice())
            .map_err(|_| ClassifierError::Malformed(format!("bbox has {} values, expected 4", w.bbox.len())))?;

        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(ClassifierError::Malformed("bbox contains non-finite values".into()));
        }
        if !(0.0..=1.0).contains(&w.score) {
            return Err(ClassifierError::Malformed(format!("score {} outside [0, 1]", w.score)));
        }

        Ok(Detection {
            bbox: BoundingBox::new(x, y, width, height),
            label: w.class,
            score: w.score,
        })
    }
}

/// Decode a classify response body
pub fn decode_classify_response(body: &[u8]) -> Result<Vec<Detection>, ClassifierError> {
    let response: ClassifyResponse =
        serde_json::from_slice(body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    match response {
        ClassifyResponse::Detections { detections, .. } => {
            detections.into_iter().map(Detection::try_from).collect()
        }
        ClassifyResponse::Error { error } => Err(ClassifierError::Remote(error)),
    }
}
