//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Counts what happens to frames on their way through the pipeline.
#[derive(Debug)]
pub struct PipelineMetrics {
    started_at: Instant,
    frames_pushed: AtomicU64,
    frames_published: AtomicU64,
    frames_dropped: AtomicU64,
    frames_encoded: AtomicU64,
    encode_failures: AtomicU64,
    bytes_encoded: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_pushed: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
        }
    }

    /// Record a frame accepted from the producer.
    pub fn record_push(&self) {
        self.frames_pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a swap that published a frame after overwriting `dropped` others.
    pub fn record_publish(&self, dropped: u64) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.frames_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Record one successful encode.
    pub fn record_encode(&self, bytes: usize) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a codec failure.
    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current counters.
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            frames_pushed: self.frames_pushed.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub uptime_seconds: u64,
    pub frames_pushed: u64,
    pub frames_published: u64,

    /// Frames overwritten before they were published.
    pub frames_dropped: u64,

    /// Encodes across all encoders; one frame encoded by two encoders counts twice.
    pub frames_encoded: u64,
    pub encode_failures: u64,
    pub bytes_encoded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = PipelineMetrics::new();
        metrics.record_push();
        metrics.record_push();
        metrics.record_push();
        metrics.record_publish(2);
        metrics.record_encode(100);
        metrics.record_encode(50);
        metrics.record_encode_failure();

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_pushed, 3);
        assert_eq!(stats.frames_published, 1);
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.frames_encoded, 2);
        assert_eq!(stats.bytes_encoded, 150);
        assert_eq!(stats.encode_failures, 1);
    }
}
