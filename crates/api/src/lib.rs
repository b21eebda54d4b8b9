//! Driver Distraction Monitor API Server
//!
//! REST API for the in-cabin dashboard: live detection state, history,
//! drowsiness escalation controls and the emergency SOS workflow.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor::{
    DriverMonitor, FanoutSink, LoggingConfig, MemorySink, MonitorConfig, MonitorError, NotificationSink, TracingSink,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod error;
pub mod rate_limit;
mod routes;

pub use error::ApiError;
pub use rate_limit::{create_governor_config, RateLimitConfig};

/// Application state shared across handlers
pub struct AppState {
    pub monitor: Arc<DriverMonitor>,
    /// Latest notifications, including user-visible errors
    pub dashboard: Arc<MemorySink>,
    /// Prometheus renderer, if a recorder was installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(monitor: Arc<DriverMonitor>, dashboard: Arc<MemorySink>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            monitor,
            dashboard,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub camera: String,
    pub classifier: String,
    pub emergency: String,
}

/// Create the application router.
///
/// Control routes are rate limited when `rate_limit` is given; that requires
/// serving with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router(state: Arc<AppState>, rate_limit: Option<&RateLimitConfig>) -> Router {
    let mut control = Router::new()
        .route("/monitoring/start", post(routes::monitoring::start))
        .route("/monitoring/stop", post(routes::monitoring::stop))
        .route("/drowsiness/events", post(routes::drowsiness::trigger))
        .route("/drowsiness/acknowledge", post(routes::drowsiness::acknowledge))
        .route("/drowsiness/reset", post(routes::drowsiness::reset))
        .route("/sos", post(routes::sos::activate))
        .route("/sos/cancel", post(routes::sos::cancel));

    if let Some(config) = rate_limit.and_then(create_governor_config) {
        control = control.layer(GovernorLayer { config });
    }

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(routes::dashboard::status))
        .route("/history", get(routes::dashboard::history))
        .route("/metrics", get(routes::dashboard::metrics))
        .merge(control);

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.monitor.status().await;

    let classifier = if status.classifier_offline {
        "offline"
    } else if status.classifier_degraded {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            camera: if status.monitoring { "streaming" } else { "idle" }.to_string(),
            classifier: classifier.to_string(),
            emergency: status.protocol.state.as_str().to_string(),
        },
    })
}

/// Initialize logging. Safe to call more than once.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    // Already set by a test harness or an embedding application
    let _ = if config.json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
}

/// Install the Prometheus recorder once per process
pub fn install_metrics() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(HANDLE.get_or_init(|| handle).clone()),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the pipeline and serve until Ctrl-C
pub async fn run_server(config: MonitorConfig) -> Result<(), ServerError> {
    let metrics = install_metrics();

    let dashboard = Arc::new(MemorySink::new());
    let sinks: Vec<Arc<dyn NotificationSink>> = vec![dashboard.clone(), Arc::new(TracingSink)];
    let sink = Arc::new(FanoutSink::new(sinks));
    let monitor = Arc::new(DriverMonitor::from_config(&config, sink)?);

    if config.server.auto_start {
        if let Err(e) = monitor.start_monitoring().await {
            warn!("Auto-start failed, monitoring stays off: {}", e);
        }
    }

    let state = Arc::new(AppState::new(monitor.clone(), dashboard, metrics));
    let rate_limit = RateLimitConfig {
        per_second: config.server.rate_limit_per_second,
        burst_size: config.server.rate_limit_burst,
    };
    let app = create_router(state, Some(&rate_limit));

    info!("Starting API server on {}", config.server.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
