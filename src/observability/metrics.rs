//! In-process request metrics for the monitoring dashboard.
//!
//! Counters are atomic increments; latency samples live in a bounded ring so
//! memory stays flat regardless of traffic. Derived figures (error rate,
//! average latency) are computed over the last minute at read time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

const MAX_SAMPLES: usize = 1000;
const RECENT_WINDOW: Duration = Duration::from_secs(60);
const LATENCY_HISTORY: usize = 10;

struct LatencySample {
    duration_ms: u64,
    status: u16,
    recorded_at: Instant,
}

/// Request metrics recorder shared across the pipeline.
pub struct MetricsRecorder {
    started_at: Instant,
    request_count: AtomicU64,
    error_count: AtomicU64,
    samples: Mutex<VecDeque<LatencySample>>,
}

/// Point-in-time view served by `GET /api/metrics`.
/// Field spellings match the dashboard contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub uptime: u64,
    pub request_count: u64,
    pub error_rate: f64,
    pub api_latency: Vec<u64>,
    pub current_latency: f64,
    pub server_status: &'static str,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Record one completed request.
    pub fn record(&self, status: u16, duration: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.samples.lock().expect("metrics samples poisoned");
        if samples.len() == MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_millis() as u64,
            status,
            recorded_at: Instant::now(),
        });
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.samples.lock().expect("metrics samples poisoned");
        let now = Instant::now();

        let recent: Vec<&LatencySample> = samples
            .iter()
            .filter(|s| now.duration_since(s.recorded_at) < RECENT_WINDOW)
            .collect();
        let recent_errors = recent.iter().filter(|s| s.status >= 400).count();

        let error_rate = if recent.is_empty() {
            0.0
        } else {
            recent_errors as f64 / recent.len() as f64 * 100.0
        };
        let current_latency = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|s| s.duration_ms as f64).sum::<f64>() / recent.len() as f64
        };

        let api_latency = samples
            .iter()
            .rev()
            .take(LATENCY_HISTORY)
            .map(|s| s.duration_ms)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        MetricsSnapshot {
            uptime: self.uptime_secs(),
            request_count: self.request_count.load(Ordering::Relaxed),
            error_rate,
            api_latency,
            current_latency,
            server_status: "healthy",
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
