//! Tunables for the affiliate store.

use std::time::Duration;

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// How long an affiliate survives without being updated.
    pub affiliate_ttl: Duration,
    /// How long a single endpoint survives without being re-announced.
    pub endpoint_ttl: Duration,
    /// Bounded capacity of each subscriber's notification channel.
    pub subscription_buffer: usize,
    /// Interval between background garbage collection sweeps.
    pub gc_interval: Duration,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            affiliate_ttl: Duration::from_secs(30 * 60),
            endpoint_ttl: Duration::from_secs(30 * 60),
            subscription_buffer: 32,
            gc_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl StateConfig {
    /// Set the affiliate expiry. Default: 30 minutes.
    pub fn affiliate_ttl(mut self, ttl: Duration) -> Self {
        self.affiliate_ttl = ttl;
        self
    }

    /// Set the endpoint expiry. Default: 30 minutes.
    pub fn endpoint_ttl(mut self, ttl: Duration) -> Self {
        self.endpoint_ttl = ttl;
        self
    }

    /// Set the per-subscriber buffer. Default: 32. Zero is raised to one.
    pub fn subscription_buffer(mut self, n: usize) -> Self {
        self.subscription_buffer = n.max(1);
        self
    }

    /// Set the sweep interval. Default: 1 hour.
    pub fn gc_interval(mut self, d: Duration) -> Self {
        self.gc_interval = d;
        self
    }
}
