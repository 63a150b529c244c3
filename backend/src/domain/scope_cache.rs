//! In-process TTL cache for resolved scope and session state.
//!
//! Entries expire lazily: a read past the deadline evicts the entry and
//! reports a miss. There is no background sweeper. One mutex guards the
//! backing map and every critical section is a single map operation.
//!
//! Values are cloned on the way in and on the way out, so callers never hold
//! a reference into cache-owned state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{MonotonicClock, SystemMonotonicClock};

/// Deadline horizon used when a requested TTL does not fit in an `Instant`.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe TTL cache keyed by strings.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tenant_scope::domain::ScopeCache;
///
/// let cache = ScopeCache::new();
/// cache.set("scope:user-1", &vec![1, 2, 3], Duration::from_secs(60));
/// assert_eq!(cache.get("scope:user-1"), Some(vec![1, 2, 3]));
/// cache.clear("scope:user-1");
/// assert_eq!(cache.get("scope:user-1"), None);
/// ```
pub struct ScopeCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    clock: Arc<dyn MonotonicClock>,
}

impl<V: Clone> ScopeCache<V> {
    /// Cache driven by the system monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemMonotonicClock))
    }

    /// Cache driven by an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Read a copy of the live value for `key`.
    ///
    /// An entry whose deadline has been reached is evicted and reported as
    /// absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store a copy of `value` for `ttl`, replacing any previous entry.
    ///
    /// A TTL too large for the clock is capped at roughly a century.
    pub fn set(&self, key: impl Into<String>, value: &V, ttl: Duration) {
        let now = self.clock.now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(MAX_TTL))
            .unwrap_or(now);
        self.lock().insert(
            key.into(),
            Entry {
                value: value.clone(),
                expires_at,
            },
        );
    }

    /// Drop the entry for `key`, if any.
    pub fn clear(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for ScopeCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for ScopeCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Expiry and isolation behaviour.
    use super::*;
    use crate::domain::ManualClock;
    use rstest::{fixture, rstest};

    const TTL: Duration = Duration::from_secs(30);

    #[fixture]
    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new())
    }

    fn cache(clock: &Arc<ManualClock>) -> ScopeCache<Vec<String>> {
        ScopeCache::with_clock(clock.clone())
    }

    #[rstest]
    fn entry_is_visible_until_deadline(clock: Arc<ManualClock>) {
        let cache = cache(&clock);
        cache.set("k", &vec!["v".to_owned()], TTL);
        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(cache.get("k"), Some(vec!["v".to_owned()]));
    }

    #[rstest]
    fn entry_expires_at_deadline_and_is_evicted(clock: Arc<ManualClock>) {
        let cache = cache(&clock);
        cache.set("k", &vec!["v".to_owned()], TTL);
        clock.advance(TTL);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[rstest]
    fn rewrite_just_before_expiry_uses_fresh_ttl(clock: Arc<ManualClock>) {
        let cache = cache(&clock);
        cache.set("k", &vec!["old".to_owned()], TTL);
        clock.advance(TTL - Duration::from_secs(1));
        cache.set("k", &vec!["new".to_owned()], TTL);
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("k"), Some(vec!["new".to_owned()]));
        clock.advance(TTL);
        assert_eq!(cache.get("k"), None);
    }

    #[rstest]
    fn reads_return_independent_copies(clock: Arc<ManualClock>) {
        let cache = cache(&clock);
        let mut value = vec!["a".to_owned()];
        cache.set("k", &value, TTL);
        value.push("mutated".to_owned());

        let mut read = cache.get("k").expect("cached");
        read.push("also mutated".to_owned());
        assert_eq!(cache.get("k"), Some(vec!["a".to_owned()]));
    }

    #[rstest]
    fn clear_removes_only_the_named_key(clock: Arc<ManualClock>) {
        let cache = cache(&clock);
        cache.set("a", &vec![], TTL);
        cache.set("b", &vec![], TTL);
        cache.clear("a");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[rstest]
    #[case(Duration::MAX)]
    #[case(Duration::from_secs(u64::MAX))]
    fn oversized_ttls_are_capped_instead_of_overflowing(
        clock: Arc<ManualClock>,
        #[case] ttl: Duration,
    ) {
        let cache = cache(&clock);
        cache.set("k", &vec!["v".to_owned()], ttl);
        clock.advance(Duration::from_secs(365 * 24 * 60 * 60));
        assert_eq!(cache.get("k"), Some(vec!["v".to_owned()]));
    }

    #[rstest]
    fn concurrent_writers_do_not_lose_entries() {
        let cache: Arc<ScopeCache<usize>> = Arc::new(ScopeCache::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.set(format!("{worker}:{i}"), &i, TTL);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }
        assert_eq!(cache.len(), 400);
    }
}
