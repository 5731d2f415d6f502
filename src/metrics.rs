use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Monotonic chat counters, shared by reference and updated with atomic increments.
#[derive(Debug)]
pub struct GatewayMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    success_latency_ms: AtomicU64,
    /// `u64::MAX` until the first success.
    min_latency_ms: AtomicU64,
    max_latency_ms: AtomicU64,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            success_latency_ms: AtomicU64::new(0),
            min_latency_ms: AtomicU64::new(u64::MAX),
            max_latency_ms: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub average_response_ms: f64,
    pub min_response_ms: u64,
    pub max_response_ms: u64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.success_latency_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(ms, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let successes = self.successes.load(Ordering::Relaxed);
        let latency = self.success_latency_ms.load(Ordering::Relaxed);
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            request_count: self.requests.load(Ordering::Relaxed),
            success_count: successes,
            error_count: self.errors.load(Ordering::Relaxed),
            average_response_ms: if successes == 0 {
                0.0
            } else {
                latency as f64 / successes as f64
            },
            min_response_ms: if min == u64::MAX { 0 } else { min },
            max_response_ms: self.max_latency_ms.load(Ordering::Relaxed),
        }
    }
}
