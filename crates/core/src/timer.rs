//! Frame timing for periodic throughput reports.

use std::time::{Duration, Instant};

/// Counts frames and reports an average rate once per interval.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    window_start: Instant,
    interval: Duration,
    frames_total: u64,
    frames_in_window: u32,
}

/// One throughput sample produced by [`FrameTimer::frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frames: u32,
    pub fps: f64,
    pub avg_frame_ms: f64,
}

impl FrameTimer {
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            window_start: now,
            interval,
            frames_total: 0,
            frames_in_window: 0,
        }
    }

    /// Record one completed frame. Returns a report when the interval elapsed.
    pub fn frame(&mut self) -> Option<FrameReport> {
        self.frame_at(Instant::now())
    }

    fn frame_at(&mut self, now: Instant) -> Option<FrameReport> {
        self.frames_total += 1;
        self.frames_in_window += 1;

        let window = now.saturating_duration_since(self.window_start);
        if window < self.interval {
            return None;
        }

        let secs = window.as_secs_f64();
        let report = FrameReport {
            frames: self.frames_in_window,
            fps: f64::from(self.frames_in_window) / secs,
            avg_frame_ms: secs * 1000.0 / f64::from(self.frames_in_window),
        };
        self.window_start = now;
        self.frames_in_window = 0;
        Some(report)
    }

    pub fn frames_total(&self) -> u64 {
        self.frames_total
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
