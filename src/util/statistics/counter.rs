use std::sync::atomic::{AtomicU64, Ordering};

/// A shared append-only event counter.
#[derive(Default)]
pub struct EventCounter {
    count: AtomicU64,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, value: u64) {
        self.count.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Aggregates nanosecond latency samples: event count, total, minimum and
/// maximum. Each field updates with one atomic operation, so samples from
/// concurrent recorders never block each other.
pub struct LatencyCounter {
    events: AtomicU64,
    total_ns: AtomicU64,
    min_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl LatencyCounter {
    pub fn new() -> Self {
        Self {
            events: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
            min_ns: AtomicU64::new(u64::MAX),
            max_ns: AtomicU64::new(0),
        }
    }

    pub fn record(&self, ns: u64) {
        self.events.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);
        self.min_ns.fetch_min(ns, Ordering::Relaxed);
        self.max_ns.fetch_max(ns, Ordering::Relaxed);
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }

    /// The smallest sample, or `None` before the first event.
    pub fn min_ns(&self) -> Option<u64> {
        match self.min_ns.load(Ordering::Relaxed) {
            u64::MAX => None,
            v => Some(v),
        }
    }

    pub fn max_ns(&self) -> u64 {
        self.max_ns.load(Ordering::Relaxed)
    }

    pub fn mean_ns(&self) -> f64 {
        let events = self.events();
        if events == 0 {
            return 0.0;
        }
        self.total_ns() as f64 / events as f64
    }
}

impl Default for LatencyCounter {
    fn default() -> Self {
        Self::new()
    }
}
