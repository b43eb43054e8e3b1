//! V4L2 memory-mapped capture for Linux
//!
//! Negotiates an exact capture format, maps a small pool of driver buffers into
//! the process, and runs a dequeue -> consume -> requeue cycle over them. Frames
//! are handed out as borrowed views into the mapped buffers, so capturing does
//! not copy unless the caller asks for a copy.

mod capture;
mod config;
mod device;
mod format;
mod handle;
mod negotiate;
mod pool;
mod stream;
mod sys;
mod v4l2;

#[cfg(test)]
pub(crate) mod mock;

pub use capture::Frame;
pub use config::{CameraConfig, ControlSetting, Priority, WaitStrategy};
pub use device::{BufferLayout, Capabilities, DequeuedBuffer, MappedRegion, VideoDevice};
pub use format::{AppliedFormat, FieldOrder, FormatRequest, FourCC, NegotiatedFormat, PixelFormat};
pub use handle::Camera;
pub use negotiate::{
    Negotiated, apply_controls, apply_priority, negotiate, negotiate_format, verify_capabilities,
};
pub use stream::StreamState;
pub use v4l2::{Mapping, V4l2Device};

/// Device node for a capture device index
pub fn device_path(index: i32) -> String {
    format!("/dev/video{index}")
}
