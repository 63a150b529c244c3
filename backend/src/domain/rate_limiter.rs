//! Per-key limiter for scope-mutating operations.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::{MonotonicClock, SystemMonotonicClock};

/// Allows at most `max_events` calls per key inside any `window`.
///
/// Each key keeps a deque of accepted event instants. A call evicts instants
/// at least `window` old, then accepts and records itself only while fewer
/// than `max_events` remain. Rejected calls are not recorded.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tenant_scope::domain::RateLimiter;
///
/// let limiter = RateLimiter::new(2, Duration::from_secs(60));
/// assert!(limiter.allow("user-1"));
/// assert!(limiter.allow("user-1"));
/// assert!(!limiter.allow("user-1"));
/// assert!(limiter.allow("user-2"));
/// ```
pub struct RateLimiter {
    max_events: usize,
    window: Duration,
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
    clock: Arc<dyn MonotonicClock>,
}

impl RateLimiter {
    /// Limiter on the system monotonic clock.
    #[must_use]
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self::with_clock(max_events, window, Arc::new(SystemMonotonicClock))
    }

    /// Limiter on an injected clock.
    #[must_use]
    pub fn with_clock(max_events: usize, window: Duration, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            max_events,
            window,
            events: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Record an event for `key` if the budget allows it.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = events.entry(key.to_owned()).or_default();
        while bucket
            .front()
            .is_some_and(|seen| now.saturating_duration_since(*seen) >= self.window)
        {
            bucket.pop_front();
        }
        if bucket.len() < self.max_events {
            bucket.push_back(now);
            true
        } else {
            false
        }
    }

    /// Configured budget per window.
    #[must_use]
    pub const fn max_events(&self) -> usize {
        self.max_events
    }

    /// Configured window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_events", &self.max_events)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
