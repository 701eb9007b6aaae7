//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Outcome of an inbound rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputVerdict {
    Allowed,
    /// Refused; `first_in_burst` is set only for the first refusal since the last allowed message
    Throttled { first_in_burst: bool },
}

/// Per-connection inbound message limiter
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
    throttling: Arc<AtomicBool>,
}

impl ConnectionRateLimiter {
    pub fn new(messages_per_second: u32) -> Self {
        Self {
            input_limiter: create_limiter(messages_per_second),
            throttling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if an inbound message is allowed
    pub fn check_input(&self) -> InputVerdict {
        if self.input_limiter.check().is_ok() {
            self.throttling.store(false, Ordering::Relaxed);
            InputVerdict::Allowed
        } else {
            let already = self.throttling.swap(true, Ordering::Relaxed);
            InputVerdict::Throttled {
                first_in_burst: !already,
            }
        }
    }
}
