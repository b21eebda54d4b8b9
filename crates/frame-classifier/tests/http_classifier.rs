//! HttpClassifier against an in-process detection service

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use camera_capture::EncodedFrame;
use frame_classifier::{
    ClassificationOutcome, ClassifierClient, ClassifierConfig, ClassifierError, FrameClassifier, HttpClassifier,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_service(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr, timeout_ms: u64) -> ClassifierConfig {
    ClassifierConfig {
        base_url: format!("http://{}", addr),
        request_timeout_ms: timeout_ms,
        health_timeout_ms: timeout_ms,
        fallback_seed: Some(11),
        ..Default::default()
    }
}

fn frame() -> EncodedFrame {
    EncodedFrame {
        data_url: "data:image/jpeg;base64,/9j/".into(),
        width: 640,
        height: 480,
        sequence: 0,
    }
}

#[tokio::test]
async fn test_detections_returned_verbatim() {
    let app = Router::new().route(
        "/api/detect-phone",
        post(|Json(body): Json<Value>| async move {
            assert!(body["imageData"].as_str().unwrap().starts_with("data:image/jpeg"));
            Json(json!({
                "detections": [{"bbox": [100, 300, 120, 200], "class": "cell phone", "score": 0.92}],
                "timestamp": 1700000000000u64
            }))
        }),
    );
    let addr = spawn_service(app).await;
    let classifier = HttpClassifier::new(&config_for(addr, 2000)).unwrap();

    let detections = classifier.classify(&frame()).await.unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].score, 0.92);
    assert_eq!(detections[0].bbox.center_y(), 400.0);
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let app = Router::new().route(
        "/api/detect-phone",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Model not loaded"}))) }),
    );
    let addr = spawn_service(app).await;
    let classifier = HttpClassifier::new(&config_for(addr, 2000)).unwrap();

    let err = classifier.classify(&frame()).await.unwrap_err();
    assert_eq!(
        err,
        ClassifierError::Status {
            status: 500,
            message: "Model not loaded".into()
        }
    );
}

#[tokio::test]
async fn test_slow_service_degrades() {
    let app = Router::new().route(
        "/api/detect-phone",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(800)).await;
            Json(json!({"detections": [], "timestamp": 0}))
        }),
    );
    let addr = spawn_service(app).await;
    let config = config_for(addr, 150);
    let client = ClassifierClient::new(Arc::new(HttpClassifier::new(&config).unwrap()), &config);

    let outcome = client.classify(&frame()).await;
    assert!(matches!(
        outcome,
        ClassificationOutcome::Degraded {
            cause: ClassifierError::Timeout(150),
            ..
        }
    ));
    assert!(client.is_degraded());
}

#[tokio::test]
async fn test_unreachable_service_degrades() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = config_for(addr, 1000);
    let client = ClassifierClient::new(Arc::new(HttpClassifier::new(&config).unwrap()), &config);

    assert!(!client.health_check().await);
    assert!(client.is_offline());
    assert!(matches!(client.classify(&frame()).await, ClassificationOutcome::Degraded { .. }));
}

#[tokio::test]
async fn test_health_probe() {
    let app = Router::new().route(
        "/api/health",
        get(|| async { Json(json!({"status": "ok", "modelLoaded": true})) }),
    );
    let addr = spawn_service(app).await;
    let config = config_for(addr, 1000);
    let classifier = HttpClassifier::new(&config).unwrap();

    let health = classifier.health_check().await.unwrap();
    assert!(health.is_ok());
    assert!(health.model_loaded);

    let client = ClassifierClient::new(Arc::new(classifier), &config);
    assert!(client.health_check().await);
    assert!(!client.is_offline());
}

#[tokio::test]
async fn test_unhealthy_status_is_offline() {
    let app = Router::new().route(
        "/api/health",
        get(|| async { Json(json!({"status": "loading", "modelLoaded": false})) }),
    );
    let addr = spawn_service(app).await;
    let config = config_for(addr, 1000);
    let client = ClassifierClient::new(Arc::new(HttpClassifier::new(&config).unwrap()), &config);

    assert!(!client.health_check().await);
    assert!(client.is_offline());
}
