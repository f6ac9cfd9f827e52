//! Dispatch counters for monitoring.

use crate::error::{ErrorCode, NEXT_FREE_ERROR_CODE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const CODE_SLOTS: usize = NEXT_FREE_ERROR_CODE as usize;

/// Lock-free counters updated once per dispatched request.
#[derive(Debug)]
pub struct DispatchStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: [AtomicU64; CODE_SLOTS],
    start_time: Instant,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub requests: u64,
    pub successes: u64,
    /// Failure count per error code; codes that never occurred are omitted.
    pub failures: BTreeMap<u32, u64>,
}

impl StatsSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: std::array::from_fn(|_| AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_success(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, code: ErrorCode) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let slot = (code.as_u32() as usize).min(CODE_SLOTS - 1);
        self.failures[slot].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let failures = self
            .failures
            .iter()
            .enumerate()
            .filter_map(|(code, counter)| {
                let count = counter.load(Ordering::Relaxed);
                (count > 0).then_some((code as u32, count))
            })
            .collect();

        StatsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures,
        }
    }
}
