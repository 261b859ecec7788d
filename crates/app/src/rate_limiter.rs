//! Sliding-window rate limiter keyed by arbitrary strings.
//!
//! Used for login attempts (keyed by email) and for the HTTP middleware
//! (keyed by client address). State lives in process memory only.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mims_domain::error::MimsError;

/// Allows at most `max_requests` per `window` for each key.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::RateLimited`] with the seconds until the oldest
    /// hit leaves the window.
    pub fn check(&self, key: &str) -> Result<(), MimsError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), MimsError> {
        let mut hits = self
            .hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = hits.entry(key.to_string()).or_default();

        while entry
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.max_requests {
            let retry_after = entry
                .front()
                .map_or(self.window, |oldest| {
                    self.window.saturating_sub(now.duration_since(*oldest))
                });
            return Err(MimsError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        entry.push_back(now);
        Ok(())
    }

    /// Forget all hits for `key` (e.g. after a successful login).
    pub fn reset(&self, key: &str) {
        let mut hits = self
            .hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        hits.remove(key);
    }

    /// Drop keys with no hits inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut hits = self
            .hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        hits.retain(|_, entry| {
            entry
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
    }
}
