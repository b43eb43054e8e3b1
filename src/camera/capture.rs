//! Dequeue -> consume -> requeue cycle

use super::config::WaitStrategy;
use super::device::{DequeuedBuffer, VideoDevice, is_not_ready};
use super::pool::BufferPool;
use crate::error::{Error, Result};
use std::io;
use std::time::Duration;
use tracing::{error, trace, warn};

/// One captured frame, borrowed from a mapped device buffer.
///
/// Only valid inside the capture callback: the buffer goes back to the device as
/// soon as the callback returns.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    data: &'a [u8],
    index: u32,
    sequence: u32,
    timestamp: Duration,
}

impl<'a> Frame<'a> {
    /// Valid frame bytes
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Number of valid bytes (the device's used length)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the device delivered an empty frame
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Index of the buffer the frame lives in
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Driver frame sequence number
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Driver capture timestamp
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Runs one capture cycle per call against a device and its buffer pool
#[derive(Debug, Clone, Copy)]
pub(crate) struct CaptureEngine {
    wait: WaitStrategy,
}

impl CaptureEngine {
    pub(crate) fn new(wait: WaitStrategy) -> Self {
        Self { wait }
    }

    /// Dequeue one frame, hand it to `on_frame`, then requeue its buffer.
    ///
    /// Succeeds only once the buffer is back with the device.
    pub(crate) fn capture<D, F, T>(
        &self,
        device: &mut D,
        pool: &BufferPool<D::Region>,
        on_frame: F,
    ) -> Result<T>
    where
        D: VideoDevice,
        F: for<'f> FnOnce(Frame<'f>) -> T,
    {
        let dequeued = self.dequeue_next(device)?;

        let Some(buffer) = pool.get(dequeued.index) else {
            error!(
                index = dequeued.index,
                count = pool.count(),
                "device returned an unknown buffer index"
            );
            return Err(Error::BufferDequeue(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("buffer index {} is not mapped", dequeued.index),
            )));
        };

        let used = dequeued.bytes_used as usize;
        if used > buffer.length() {
            warn!(
                index = dequeued.index,
                used,
                length = buffer.length(),
                "used length exceeds buffer, clamping"
            );
        }

        let value = on_frame(Frame {
            data: buffer.filled(used),
            index: dequeued.index,
            sequence: dequeued.sequence,
            timestamp: dequeued.timestamp,
        });

        device.queue_buffer(dequeued.index).map_err(|e| {
            error!(index = dequeued.index, error = %e, "unable to requeue buffer");
            Error::BufferEnqueue {
                index: dequeued.index,
                source: e,
            }
        })?;
        trace!(index = dequeued.index, sequence = dequeued.sequence, used, "frame consumed");

        Ok(value)
    }

    /// Copy variant: writes `min(used, dest.len())` bytes and returns that count.
    ///
    /// Larger frames are truncated silently.
    pub(crate) fn capture_into<D: VideoDevice>(
        &self,
        device: &mut D,
        pool: &BufferPool<D::Region>,
        dest: &mut [u8],
    ) -> Result<usize> {
        self.capture(device, pool, |frame| {
            let n = frame.len().min(dest.len());
            dest[..n].copy_from_slice(&frame.data()[..n]);
            n
        })
    }

    /// Retry "not ready" without bound; any other failure is fatal
    fn dequeue_next<D: VideoDevice>(&self, device: &mut D) -> Result<DequeuedBuffer> {
        let mut not_ready: u64 = 0;
        loop {
            match device.dequeue_buffer() {
                Ok(dequeued) => {
                    if not_ready > 0 {
                        trace!(not_ready, "frame became ready");
                    }
                    return Ok(dequeued);
                }
                Err(e) if is_not_ready(&e) => {
                    not_ready += 1;
                    match self.wait.interval() {
                        None => std::hint::spin_loop(),
                        Some(interval) => {
                            device.wait_readable(interval).map_err(|e| {
                                error!(error = %e, "readiness wait failed");
                                Error::BufferDequeue(e)
                            })?;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "unable to dequeue buffer");
                    return Err(Error::BufferDequeue(e));
                }
            }
        }
    }
}
