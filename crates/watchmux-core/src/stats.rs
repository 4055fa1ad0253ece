//! Dispatch statistics.
//!
//! Each engine keeps one [`DispatchStats`] and exposes a copy of the counters
//! as a [`StatsSnapshot`].

use std::cell::Cell;

use serde::Serialize;

/// Counters for a single engine.
#[derive(Debug, Default)]
pub struct DispatchStats {
    records_seen: Cell<u64>,
    deliveries: Cell<u64>,
    failures: Cell<u64>,
    rearms: Cell<u64>,
    drained: Cell<u64>,
}

fn bump(counter: &Cell<u64>, by: u64) {
    counter.set(counter.get().saturating_add(by));
}

impl DispatchStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation event entering dispatch.
    pub fn record_event(&self) {
        bump(&self.records_seen, 1);
    }

    /// Record a callback that ran to completion.
    pub fn record_delivery(&self) {
        bump(&self.deliveries, 1);
    }

    /// Record a callback that panicked and was isolated.
    pub fn record_failure(&self) {
        bump(&self.failures, 1);
    }

    /// Record a full disarm and rearm of the observation session.
    pub fn record_rearm(&self) {
        bump(&self.rearms, 1);
    }

    /// Record records taken from the session before a rearm.
    pub fn record_drained(&self, count: usize) {
        bump(&self.drained, count as u64);
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_seen: self.records_seen.get(),
            deliveries: self.deliveries.get(),
            failures: self.failures.get(),
            rearms: self.rearms.get(),
            drained: self.drained.get(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.records_seen.set(0);
        self.deliveries.set(0);
        self.failures.set(0);
        self.rearms.set(0);
        self.drained.set(0);
    }
}

/// Point-in-time copy of an engine's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Mutation events that entered dispatch.
    pub records_seen: u64,
    /// Callbacks that ran to completion.
    pub deliveries: u64,
    /// Callbacks that panicked under the isolate policy.
    pub failures: u64,
    /// Full session rearms.
    pub rearms: u64,
    /// Records drained from the session before a rearm.
    pub drained: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let stats = DispatchStats::new();
        stats.record_event();
        stats.record_delivery();
        stats.record_delivery();
        stats.record_failure();
        stats.record_rearm();
        stats.record_drained(3);

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                records_seen: 1,
                deliveries: 2,
                failures: 1,
                rearms: 1,
                drained: 3,
            }
        );

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
