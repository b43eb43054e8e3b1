//! Camera configuration

use super::format::{FormatRequest, PixelFormat};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0). Must not be negative.
    pub device_index: i32,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Pixel format
    pub format: PixelFormat,

    /// Number of V4L2 buffers to request and keep mapped
    pub buffer_count: u32,

    /// How the capture loop waits for the next frame
    pub wait: WaitStrategy,

    /// Access priority to claim after format negotiation
    pub priority: Option<Priority>,

    /// Controls applied (and verified) after format negotiation, in order
    pub controls: Vec<ControlSetting>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            format: PixelFormat::Yuyv,
            buffer_count: 2,
            wait: WaitStrategy::default(),
            priority: None,
            controls: Vec::new(),
        }
    }
}

impl CameraConfig {
    /// Preset for webcams that only speak uncompressed YUYV at VGA
    pub fn compatible() -> Self {
        Self::default()
    }

    /// Preset for 720p MJPEG capture with a deeper buffer pool
    pub fn mjpeg_hd() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: PixelFormat::Mjpeg,
            buffer_count: 4,
            ..Default::default()
        }
    }

    /// Builder-style override of device index
    pub fn with_device_index(mut self, index: i32) -> Self {
        self.device_index = index;
        self
    }

    /// Builder-style override of format and geometry
    pub fn with_format(mut self, format: PixelFormat, width: u32, height: u32) -> Self {
        self.format = format;
        self.width = width;
        self.height = height;
        self
    }

    /// Builder-style override of the buffer pool size
    pub fn with_buffer_count(mut self, count: u32) -> Self {
        self.buffer_count = count;
        self
    }

    /// Builder-style override of the wait strategy
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Reject configurations that can never be negotiated.
    ///
    /// Runs before the device is touched.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InputBad(format!(
                "frame size must be non-0 for both dimensions (got {}x{})",
                self.width, self.height
            )));
        }
        if self.device_index < 0 {
            return Err(Error::InputBad(format!(
                "device index must be >= 0 (got {})",
                self.device_index
            )));
        }
        if self.buffer_count == 0 {
            return Err(Error::InputBad("buffer count must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Device node for the configured index
    pub fn device_path(&self) -> String {
        super::device_path(self.device_index)
    }

    /// Format request derived from this configuration
    pub fn format_request(&self) -> FormatRequest {
        FormatRequest::new(self.format, self.width, self.height)
    }
}

/// How the capture loop reacts to "no frame ready yet"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Retry the dequeue immediately, without bound
    Spin,
    /// Wait for readiness up to `interval_ms` between dequeue attempts
    Poll {
        /// Upper bound on a single readiness wait
        interval_ms: u64,
    },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Poll { interval_ms: 100 }
    }
}

impl WaitStrategy {
    /// Readiness wait bound, `None` when spinning
    pub fn interval(self) -> Option<Duration> {
        match self {
            WaitStrategy::Spin => None,
            WaitStrategy::Poll { interval_ms } => Some(Duration::from_millis(interval_ms.max(1))),
        }
    }
}

/// V4L2 access priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Lowest priority, yields to everyone
    Background,
    /// Default priority of a newly opened handle
    Interactive,
    /// Exclusive recording priority
    Record,
}

impl Priority {
    /// Kernel ABI value (`enum v4l2_priority`)
    pub fn as_raw(self) -> u32 {
        match self {
            Priority::Background => 1,
            Priority::Interactive => 2,
            Priority::Record => 3,
        }
    }

    /// Parse a kernel ABI value
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Priority::Background),
            2 => Some(Priority::Interactive),
            3 => Some(Priority::Record),
            _ => None,
        }
    }

    /// Parse from a user-provided string (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "background" => Some(Priority::Background),
            "interactive" => Some(Priority::Interactive),
            "record" => Some(Priority::Record),
            _ => None,
        }
    }
}

/// One V4L2 control to set at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSetting {
    /// Control identifier (`V4L2_CID_*`)
    pub id: u32,
    /// Value to apply
    pub value: i32,
}
