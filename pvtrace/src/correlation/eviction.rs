//! Idle eviction for correlation state
//!
//! A task that dies between entry and exit never sends the exit that would
//! release its state. The correlators ask an [`EvictionPolicy`] on every sweep
//! whether a key has been quiet for too long.

use std::time::Duration;

use crate::domain::KernelTime;

/// Decides when correlation state for one key is stale
pub trait EvictionPolicy {
    /// `last_seen` is the kernel time of the key's latest event
    fn is_expired(&self, last_seen: KernelTime, now: KernelTime) -> bool;
}

/// Evict keys with no events for longer than `max_idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimeout {
    pub max_idle: Duration,
}

impl IdleTimeout {
    pub fn new(max_idle: Duration) -> Self {
        Self { max_idle }
    }
}

impl Default for IdleTimeout {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl EvictionPolicy for IdleTimeout {
    fn is_expired(&self, last_seen: KernelTime, now: KernelTime) -> bool {
        u128::from(now.saturating_since(last_seen)) > self.max_idle.as_nanos()
    }
}

/// Keep state until its calls complete
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEvict;

impl EvictionPolicy for NeverEvict {
    fn is_expired(&self, _last_seen: KernelTime, _now: KernelTime) -> bool {
        false
    }
}
