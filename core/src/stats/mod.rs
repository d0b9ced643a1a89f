//! Runtime counters for the thumbnail cache.
//!
//! The provider records every lookup, every fetch it dispatches, and how long fetches take. Hosts
//! read a [`CacheSnapshot`] to show cache effectiveness or to spot a stalled network layer.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

const DEFAULT_SAMPLE_CAPACITY: usize = 240;

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn percentile(&self, percentile: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let rank = percentile.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        sorted.get(rank.round() as usize).copied().unwrap_or(0.0)
    }
}

#[derive(Debug)]
struct StatsInner {
    started_at: Instant,
    fetch_times_ms: SampleWindow,
    lookups: u64,
    hits: u64,
    joined: u64,
    fetches: u64,
    fetch_failures: u64,
    timeouts: u64,
    bytes_used: u64,
    bytes_capacity: u64,
    pending: usize,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            fetch_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            lookups: 0,
            hits: 0,
            joined: 0,
            fetches: 0,
            fetch_failures: 0,
            timeouts: 0,
            bytes_used: 0,
            bytes_capacity: 0,
            pending: 0,
        }
    }
}

/// Thread-safe counters shared by the provider and its fetch callbacks.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: parking_lot::Mutex<StatsInner>,
}

impl StatsCollector {
    /// Create a collector with the default latency sampling window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whether a lookup was served from the cache.
    pub fn record_lookup(&self, hit: bool) {
        let mut guard = self.inner.lock();
        guard.lookups = guard.lookups.saturating_add(1);
        if hit {
            guard.hits = guard.hits.saturating_add(1);
        }
    }

    /// Record a request that piggybacked on a fetch another caller already dispatched.
    pub fn record_joined(&self) {
        let mut guard = self.inner.lock();
        guard.joined = guard.joined.saturating_add(1);
    }

    /// Record a fetch handed to the thumbnail source.
    pub fn record_fetch_dispatched(&self) {
        let mut guard = self.inner.lock();
        guard.fetches = guard.fetches.saturating_add(1);
    }

    /// Record how long a fetch took and whether it produced bytes.
    pub fn record_fetch_finished(&self, duration: Duration, succeeded: bool) {
        let mut guard = self.inner.lock();
        guard.fetch_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
        if !succeeded {
            guard.fetch_failures = guard.fetch_failures.saturating_add(1);
        }
    }

    /// Record a fetch abandoned because its waiters ran out of time.
    pub fn record_timeout(&self) {
        let mut guard = self.inner.lock();
        guard.timeouts = guard.timeouts.saturating_add(1);
    }

    /// Update the cache usage counters and the number of keys in flight.
    pub fn update_cache_usage(&self, used_bytes: u64, capacity_bytes: u64, pending: usize) {
        let mut guard = self.inner.lock();
        guard.bytes_used = used_bytes;
        guard.bytes_capacity = capacity_bytes;
        guard.pending = pending;
    }

    /// Copy the current counters into a serializable snapshot.
    pub fn snapshot(&self) -> CacheSnapshot {
        let guard = self.inner.lock();
        let hit_ratio = guard.hits as f32 / guard.lookups.max(1) as f32;

        CacheSnapshot {
            timestamp_ms: now_ms(),
            uptime_ms: guard.started_at.elapsed().as_millis() as u64,
            lookups: guard.lookups,
            hit_ratio,
            joined: guard.joined,
            fetches: guard.fetches,
            fetch_failures: guard.fetch_failures,
            timeouts: guard.timeouts,
            fetch_time_ms_p50: guard.fetch_times_ms.percentile(0.50),
            fetch_time_ms_p95: guard.fetch_times_ms.percentile(0.95),
            bytes_used: guard.bytes_used,
            bytes_capacity: guard.bytes_capacity,
            pending: guard.pending,
        }
    }
}

fn now_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(delta) => delta.as_millis() as u64,
        Err(err) => {
            warn!("system clock error: {err}");
            0
        }
    }
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub timestamp_ms: u64,
    pub uptime_ms: u64,
    pub lookups: u64,
    pub hit_ratio: f32,
    pub joined: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub timeouts: u64,
    pub fetch_time_ms_p50: f32,
    pub fetch_time_ms_p95: f32,
    pub bytes_used: u64,
    pub bytes_capacity: u64,
    pub pending: usize,
}
