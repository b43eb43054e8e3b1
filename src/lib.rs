//! mmapcam - memory-mapped V4L2 capture for Linux
//!
//! Opens a capture device, negotiates an exact pixel format and resolution, maps
//! a small pool of driver buffers into the process, and hands out frames as
//! borrowed views into those buffers.
//!
//! # Features
//!
//! - **Exact negotiation**: a driver-adjusted format is an error, never a silent fallback
//! - **Zero-copy frames**: callbacks borrow mapped device memory directly
//! - **Safe teardown**: partial setup failures and drops release every mapping
//! - **Pluggable device**: the protocol runs over any [`camera::VideoDevice`]
//!
//! # Example
//!
//! ```no_run
//! use mmapcam::{Camera, CameraConfig, PixelFormat};
//!
//! fn main() -> mmapcam::Result<()> {
//!     let config = CameraConfig::default().with_format(PixelFormat::Mjpeg, 1280, 720);
//!     let mut camera = Camera::open(&config)?;
//!
//!     camera.start()?;
//!     for _ in 0..10 {
//!         let len = camera.capture_with(|frame| frame.len())?;
//!         println!("frame of {len} bytes");
//!     }
//!     camera.stop()?;
//!     camera.destroy()
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod camera;
pub mod config;
pub mod error;
pub mod logging;
pub mod stats;

// Re-exports for convenience
pub use error::{Error, Result};

pub use camera::{Camera, CameraConfig, Frame, NegotiatedFormat, PixelFormat, WaitStrategy};
pub use config::{CameraOptions, LogRotation, LoggingOptions, MmapcamConfig};
pub use stats::{CaptureStats, CaptureSummary};
