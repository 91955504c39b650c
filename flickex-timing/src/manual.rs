use crate::timer::{FrameTimes, FrameTimingStats, Timer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Deterministic timer driven by hand. Clones share the same clock.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frames: FrameTimes,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(0)),
            frames: FrameTimes::new(1000),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, since_origin: Duration) {
        self.now_ns
            .store(since_origin.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    /// Sleeping just moves the shared clock forward.
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }

    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }

    fn frame_stats(&self) -> FrameTimingStats {
        self.frames.stats()
    }
}
