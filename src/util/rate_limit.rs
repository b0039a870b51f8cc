//! Per-connection message rate limiting

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a limiter allowing `per_second` messages with a burst of the same size
pub fn create_limiter(per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Join attempts per second on one connection
pub const JOIN_RATE_LIMIT: u32 = 2;

/// Limits for one WebSocket connection
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    messages: Arc<Limiter>,
    joins: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    /// Inputs are allowed at twice the tick rate to absorb network bunching
    pub fn new(tick_rate: u32) -> Self {
        Self {
            messages: create_limiter(tick_rate.saturating_mul(2)),
            joins: create_limiter(JOIN_RATE_LIMIT),
        }
    }

    pub fn check_message(&self) -> bool {
        self.messages.check().is_ok()
    }

    pub fn check_join(&self) -> bool {
        self.joins.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_limited() {
        let limiter = ConnectionRateLimiter::new(5);
        let allowed = (0..50).filter(|_| limiter.check_message()).count();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn join_attempts_are_limited_separately() {
        let limiter = ConnectionRateLimiter::new(60);
        assert!(limiter.check_join());
        assert!(limiter.check_join());
        assert!(!limiter.check_join());
        assert!(limiter.check_message());
    }
}
