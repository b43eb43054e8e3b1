//! Capture statistics for a run of frames

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Running counters for one capture session
#[derive(Debug)]
pub struct CaptureStats {
    frames: u64,
    failures: u64,
    bytes: u64,
    started: Instant,
    last_frame: Option<Instant>,
    frame_interval_total: Duration,
    frame_interval_samples: u64,
    frame_interval_max: Duration,
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStats {
    /// Start counting now
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(started: Instant) -> Self {
        Self {
            frames: 0,
            failures: 0,
            bytes: 0,
            started,
            last_frame: None,
            frame_interval_total: Duration::ZERO,
            frame_interval_samples: 0,
            frame_interval_max: Duration::ZERO,
        }
    }

    /// Record a frame of `len` bytes captured now
    pub fn record_frame(&mut self, len: usize) {
        self.record_frame_at(len, Instant::now());
    }

    fn record_frame_at(&mut self, len: usize, at: Instant) {
        if let Some(previous) = self.last_frame {
            let interval = at.saturating_duration_since(previous);
            self.frame_interval_total += interval;
            self.frame_interval_samples += 1;
            if interval > self.frame_interval_max {
                self.frame_interval_max = interval;
            }
        }
        self.last_frame = Some(at);
        self.frames += 1;
        self.bytes = self.bytes.saturating_add(len as u64);
    }

    /// Record a capture attempt that failed
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Frames recorded so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Freeze the counters into a report
    pub fn summary(&self) -> CaptureSummary {
        self.summary_at(Instant::now())
    }

    fn summary_at(&self, now: Instant) -> CaptureSummary {
        let elapsed = now.saturating_duration_since(self.started);

        let frame_interval_avg = if self.frame_interval_samples > 0 {
            let divisor = u32::try_from(self.frame_interval_samples).unwrap_or(u32::MAX);
            self.frame_interval_total.checked_div(divisor)
        } else {
            None
        };
        let frame_interval_max =
            (self.frame_interval_samples > 0).then_some(self.frame_interval_max);

        let fps = match frame_interval_avg {
            Some(avg) if !avg.is_zero() => 1.0 / avg.as_secs_f64(),
            _ => 0.0,
        };

        CaptureSummary {
            frames: self.frames,
            failures: self.failures,
            bytes: self.bytes,
            elapsed_ms: millis(elapsed),
            frame_interval_avg_ms: frame_interval_avg.map(millis),
            frame_interval_max_ms: frame_interval_max.map(millis),
            fps,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Report printed at the end of a capture run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSummary {
    /// Frames captured
    pub frames: u64,
    /// Capture attempts that failed
    pub failures: u64,
    /// Total frame bytes
    pub bytes: u64,
    /// Wall time since counting started
    pub elapsed_ms: f64,
    /// Mean time between consecutive frames
    pub frame_interval_avg_ms: Option<f64>,
    /// Longest time between consecutive frames
    pub frame_interval_max_ms: Option<f64>,
    /// Frame rate derived from the mean interval
    pub fps: f64,
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames:    {}", self.frames)?;
        if self.failures > 0 {
            writeln!(f, "failures:  {}", self.failures)?;
        }
        writeln!(f, "bytes:     {}", self.bytes)?;
        writeln!(f, "elapsed:   {:.1} ms", self.elapsed_ms)?;
        match (self.frame_interval_avg_ms, self.frame_interval_max_ms) {
            (Some(avg), Some(max)) => {
                writeln!(f, "interval:  {avg:.2} ms mean, {max:.2} ms max")?;
                write!(f, "fps:       {:.2}", self.fps)
            }
            _ => write!(f, "interval:  n/a"),
        }
    }
}
