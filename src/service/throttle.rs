use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

/// When the per-account window is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPolicy {
    /// Consume on admission. A write that later fails still spends the
    /// account's window.
    Optimistic,
    /// Consume only when `mark` is called after a durable write.
    OnSuccess,
}

/// Per-account minimum-interval write throttle. One entry per active
/// account; the entry API gives the atomic read-then-update the check needs.
/// Constructed once per server instance and passed by handle — no globals.
pub struct WriteThrottle {
    interval: Duration,
    policy: MarkPolicy,
    last_allowed: DashMap<String, Instant>,
}

impl WriteThrottle {
    pub fn new(interval: Duration, policy: MarkPolicy) -> Self {
        Self {
            interval,
            policy,
            last_allowed: DashMap::new(),
        }
    }

    /// Whether a write for this account may proceed now. A zero interval
    /// disables throttling entirely.
    pub fn allow(&self, account_id: &str) -> bool {
        self.allow_at(account_id, Instant::now())
    }

    fn allow_at(&self, account_id: &str, now: Instant) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        match self.last_allowed.entry(account_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) >= self.interval {
                    if self.policy == MarkPolicy::Optimistic {
                        entry.insert(now);
                    }
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                if self.policy == MarkPolicy::Optimistic {
                    entry.insert(now);
                }
                true
            }
        }
    }

    /// Record a completed write. Only meaningful under `OnSuccess`.
    pub fn mark(&self, account_id: &str) {
        if self.policy == MarkPolicy::OnSuccess && !self.interval.is_zero() {
            self.last_allowed.insert(account_id.to_string(), Instant::now());
        }
    }
}
