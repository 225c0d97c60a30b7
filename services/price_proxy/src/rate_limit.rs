//! Fixed-window rate limiting per client address
//!
//! Counters live in process memory. Running several proxy processes behind a
//! load balancer multiplies the effective quota; a shared store would be
//! needed to keep the per-window limit in that setup.

use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted; `count` requests seen in the current window
    Allowed { count: u32 },
    /// Quota exhausted; retry after this many whole seconds (at least 1)
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by client IP
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    clients: DashMap<IpAddr, Window>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: DashMap::new(),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request from `client` at the current time
    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Count a request from `client` at `now`
    pub fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        let mut entry = self.clients.entry(client).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });
        let window = entry.value_mut();

        if now > window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        if window.count >= self.max_requests {
            let remaining = window.reset_at.saturating_duration_since(now);
            let retry_after_secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
            debug!(%client, retry_after_secs, "rate limit exceeded");
            return RateDecision::Limited { retry_after_secs };
        }

        window.count += 1;
        RateDecision::Allowed {
            count: window.count,
        }
    }

    /// Drop counters whose window ended before `now`
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, window| window.reset_at >= now);
        before - self.clients.len()
    }

    /// Number of clients with a live counter
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}
