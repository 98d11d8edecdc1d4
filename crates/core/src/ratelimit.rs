//! Per-identifier fixed-window request limiter.
//!
//! A window opens on the first request from an identifier and lasts
//! `window_ms`. Bursts at a window boundary can reach twice the nominal rate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::sweep::Sweeper;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// Outcome of [`RateLimiter::check_and_consume`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    /// Whole seconds until the window resets, set only when rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// In-process fixed-window limiter keyed by caller identifier.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { buckets: Mutex::new(HashMap::new()), clock }
    }

    /// Count one request against `identifier` and decide whether it may proceed.
    pub fn check_and_consume(&self, identifier: &str, window_ms: u64, max_requests: u32) -> RateLimitDecision {
        let now = self.clock.now();
        let window = TimeDelta::milliseconds(i64::try_from(window_ms).unwrap_or(i64::MAX));
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        let bucket = match buckets.get_mut(identifier) {
            Some(bucket) if now <= bucket.window_reset_at => {
                bucket.count = bucket.count.saturating_add(1);
                *bucket
            }
            _ => {
                let fresh =
                    Bucket { count: 1, window_reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC) };
                buckets.insert(identifier.to_string(), fresh);
                fresh
            }
        };

        if bucket.count > max_requests {
            let wait_ms = (bucket.window_reset_at - now).num_milliseconds().max(0) as u64;
            let retry_after = wait_ms.div_ceil(1000).max(1);
            tracing::debug!(identifier, count = bucket.count, retry_after, "rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                reset_time: bucket.window_reset_at,
                retry_after: Some(retry_after),
            };
        }

        RateLimitDecision {
            allowed: true,
            limit: max_requests,
            remaining: max_requests - bucket.count,
            reset_time: bucket.window_reset_at,
            retry_after: None,
        }
    }

    /// Drop buckets whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| now <= bucket.window_reset_at);
        before - buckets.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run [`RateLimiter::sweep`] every `period` until the returned handle is stopped.
    pub fn start_sweeper(self: &Arc<Self>, period: Duration) -> Sweeper {
        let limiter = Arc::clone(self);
        Sweeper::spawn("rate-limit", period, move || {
            let limiter = Arc::clone(&limiter);
            async move {
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired rate-limit buckets");
                }
            }
        })
    }
}
