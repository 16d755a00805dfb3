//! Listener options and queue metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use contracts::DEFAULT_TIMEOUT_MS;

/// Capability set of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Owns camera parameters and an extrinsic that can be persisted
    pub has_calibration: bool,

    /// Runs its own poll thread instead of being fed by callbacks
    pub has_own_thread: bool,
}

/// Tunables shared by every listener
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// How long consumers wait for a frame
    pub timeout: Duration,

    /// Spatial resize applied by producers and to camera parameters
    pub resize_factor: f32,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            resize_factor: 1.0,
        }
    }
}

/// Listener queue metrics
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Frames pushed by the producer
    pub frames_enqueued: AtomicU64,

    /// Frames handed to consumers
    pub frames_consumed: AtomicU64,

    /// Older frames discarded by latest-frame reads
    pub frames_dropped: AtomicU64,

    /// Reads that gave up waiting
    pub timeouts: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record frame enqueued
    pub fn record_enqueued(&self, queue_len: usize) {
        self.frames_enqueued.fetch_add(1, Ordering::Relaxed);
        self.queue_len.store(queue_len, Ordering::Relaxed);
    }

    /// Record frame consumed, plus any backlog dropped with it
    pub fn record_consumed(&self, dropped: usize, queue_len: usize) {
        self.frames_consumed.fetch_add(1, Ordering::Relaxed);
        self.frames_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
        self.queue_len.store(queue_len, Ordering::Relaxed);
    }

    /// Record timed out read
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_enqueued: self.frames_enqueued.load(Ordering::Relaxed),
            frames_consumed: self.frames_consumed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_enqueued: u64,
    pub frames_consumed: u64,
    pub frames_dropped: u64,
    pub timeouts: u64,
    pub queue_len: usize,
}
