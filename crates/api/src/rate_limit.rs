//! Rate Limiting for Control Routes
//!
//! Starting the camera, raising drowsiness events and triggering SOS are
//! limited per client IP using tower_governor (GCRA, no background task).

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tracing::warn;

/// Governor config with X-RateLimit-* headers enabled
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request
    pub per_second: u64,
    /// Requests that may be made back to back
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 2,
            burst_size: 5,
        }
    }
}

/// Build the governor config used by `GovernorLayer`.
///
/// Returns `None` (no limiting) when either value is zero.
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<DefaultGovernorConfig>> {
    let built = GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish();

    if built.is_none() {
        warn!(
            "Invalid rate limit (per_second={}, burst={}), control routes are not limited",
            config.per_second, config.burst_size
        );
    }
    built.map(Arc::new)
}
