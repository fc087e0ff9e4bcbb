use std::sync::Mutex;

/// Counters shared between the reader thread and whoever reports on it.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted: usize,
    pub idle_cycles: usize,
    pub transport_errors: usize,
}

struct Metrics {
    accepted: usize,
    idle_cycles: usize,
    transport_errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                accepted: 0,
                idle_cycles: 0,
                transport_errors: 0,
            }),
        }
    }

    pub fn record_accepted(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.accepted += 1;
        }
    }

    pub fn record_idle(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.idle_cycles += 1;
        }
    }

    pub fn record_transport_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.transport_errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                accepted: metrics.accepted,
                idle_cycles: metrics.idle_cycles,
                transport_errors: metrics.transport_errors,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
