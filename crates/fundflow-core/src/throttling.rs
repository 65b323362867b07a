use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::config::RateLimit;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-bucket gate shared by every request to one upstream API.
///
/// Callers wait for a token instead of being rejected, so a burst of workers is
/// spread out over the quota window rather than tripping upstream throttling.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
    limit: RateLimit,
}

impl RateGate {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                limit.quota_window,
                limit.quota_limit,
            ))),
            limit,
        }
    }

    pub const fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Suspends until a request may be sent.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate").field("limit", &self.limit).finish()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
