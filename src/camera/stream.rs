//! Idle/Streaming transitions

use super::device::VideoDevice;
use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{error, info};

/// Streaming state of a camera as seen by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Buffers are queued but the device is not filling them
    #[default]
    Idle,
    /// The device is filling queued buffers
    Streaming,
}

/// Thin wrapper over stream-on/stream-off that refuses overlapping transitions
#[derive(Debug, Default)]
pub(crate) struct StreamController {
    state: StreamState,
}

impl StreamController {
    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Idle -> Streaming. A failed request leaves the tracked state Idle.
    pub(crate) fn start<D: VideoDevice>(&mut self, device: &mut D) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::AlreadyStreaming);
        }
        device.stream_on().map_err(|e| {
            error!(error = %e, "stream-on failed");
            Error::StartFailed(e)
        })?;
        self.state = StreamState::Streaming;
        info!("streaming started");
        Ok(())
    }

    /// Streaming -> Idle. A failed request leaves the tracked state Streaming.
    pub(crate) fn stop<D: VideoDevice>(&mut self, device: &mut D) -> Result<()> {
        if !self.is_streaming() {
            return Err(Error::NotStreaming);
        }
        device.stream_off().map_err(|e| {
            error!(error = %e, "stream-off failed");
            Error::StopFailed(e)
        })?;
        self.state = StreamState::Idle;
        info!("streaming stopped");
        Ok(())
    }
}
