//! Per-endpoint latency bookkeeping.
//!
//! Keeps a sliding window of recent samples per endpoint alongside lifetime
//! counters, and computes percentile latencies (p50, p95, p99) on read.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

/// Default number of samples retained per endpoint.
pub const DEFAULT_WINDOW: usize = 1000;

/// Latency summary for one endpoint. Durations are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

#[derive(Debug, Default)]
struct EndpointLatency {
    samples: VecDeque<Duration>,
    count: u64,
    successes: u64,
    failures: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
    last: Duration,
}

impl EndpointLatency {
    fn stats(&self) -> LatencyStats {
        let mut sorted: Vec<Duration> = self.samples.iter().copied().collect();
        sorted.sort();

        let mean = if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / u32::try_from(self.count).unwrap_or(u32::MAX)
        };

        LatencyStats {
            count: self.count,
            successes: self.successes,
            failures: self.failures,
            last_ms: as_ms(self.last),
            min_ms: as_ms(self.min.unwrap_or_default()),
            max_ms: as_ms(self.max),
            mean_ms: as_ms(mean),
            p50_ms: as_ms(percentile(&sorted, 0.50)),
            p95_ms: as_ms(percentile(&sorted, 0.95)),
            p99_ms: as_ms(percentile(&sorted, 0.99)),
        }
    }
}

/// Registry of latency observations keyed by endpoint.
pub struct LatencyRegistry {
    window: usize,
    endpoints: RwLock<HashMap<String, EndpointLatency>>,
}

impl LatencyRegistry {
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Record one call's duration and outcome.
    pub fn record(&self, endpoint: &str, duration: Duration, success: bool) {
        let mut endpoints = self.endpoints.write();
        let entry = endpoints.entry(endpoint.to_string()).or_default();

        entry.samples.push_back(duration);
        while entry.samples.len() > self.window {
            entry.samples.pop_front();
        }

        entry.count += 1;
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total = entry.total.saturating_add(duration);
        entry.min = Some(entry.min.map_or(duration, |min| min.min(duration)));
        entry.max = entry.max.max(duration);
        entry.last = duration;
    }

    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<LatencyStats> {
        self.endpoints.read().get(endpoint).map(EndpointLatency::stats)
    }

    #[must_use]
    pub fn all(&self) -> BTreeMap<String, LatencyStats> {
        self.endpoints
            .read()
            .iter()
            .map(|(endpoint, latency)| (endpoint.clone(), latency.stats()))
            .collect()
    }

    pub fn reset(&self, endpoint: &str) {
        self.endpoints.write().remove(endpoint);
    }
}

impl Default for LatencyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// Compute a percentile value from a sorted slice of durations.
///
/// Returns `Duration::ZERO` if the slice is empty.
fn percentile(samples: &[Duration], p: f64) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }

    let index = ((samples.len() as f64 - 1.0) * p).round() as usize;
    samples[index.min(samples.len() - 1)]
}

fn as_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
