//! Device-control seam between the capture protocol and the kernel

use super::format::{AppliedFormat, FormatRequest};
use serde::Serialize;
use std::io;
use std::time::Duration;

/// Identity and capability flags reported by a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Driver name
    pub driver: String,
    /// Card/device name
    pub card: String,
    /// Bus information
    pub bus_info: String,
    /// Whether the device can capture video
    pub can_capture: bool,
    /// Whether the device supports streaming I/O
    pub can_stream: bool,
}

/// Kernel-side placement of one buffer, as reported by a buffer query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// Buffer index
    pub index: u32,
    /// Allocated length in bytes
    pub length: u32,
    /// Offset to pass to the mapping call
    pub offset: u32,
}

/// Descriptor of a buffer the device has finished filling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeuedBuffer {
    /// Buffer index
    pub index: u32,
    /// Number of valid bytes written by the device
    pub bytes_used: u32,
    /// Driver frame sequence number
    pub sequence: u32,
    /// Driver capture timestamp
    pub timestamp: Duration,
}

/// A region of device memory mapped into the process.
///
/// Dropping the region unmaps it.
pub trait MappedRegion {
    /// The mapped bytes
    fn as_slice(&self) -> &[u8];

    /// Mapped length in bytes
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the mapping is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synchronous request/response operations on an open capture device.
///
/// Implementations retry transparently on interrupted calls and on nothing else.
/// Closing the device is dropping it.
pub trait VideoDevice {
    /// Memory mapping type produced by [`VideoDevice::map_buffer`]
    type Region: MappedRegion;

    /// Query identity and capability flags
    fn capabilities(&mut self) -> io::Result<Capabilities>;

    /// Submit a format and return what the device actually applied
    fn apply_format(&mut self, request: &FormatRequest) -> io::Result<AppliedFormat>;

    /// Submit an access priority and return the priority read back (`enum v4l2_priority`)
    fn set_priority(&mut self, priority: u32) -> io::Result<u32>;

    /// Set a control and return the value read back
    fn set_control(&mut self, id: u32, value: i32) -> io::Result<i32>;

    /// Ask for `count` memory-mapped buffers; returns how many were granted
    fn request_buffers(&mut self, count: u32) -> io::Result<u32>;

    /// Query length and offset of buffer `index`
    fn query_buffer(&mut self, index: u32) -> io::Result<BufferLayout>;

    /// Map a queried buffer read/write, shared with the device
    fn map_buffer(&mut self, layout: &BufferLayout) -> io::Result<Self::Region>;

    /// Hand buffer `index` to the device
    fn queue_buffer(&mut self, index: u32) -> io::Result<()>;

    /// Take a completed buffer from the device.
    ///
    /// Fails with [`io::ErrorKind::WouldBlock`] when no frame is ready yet.
    fn dequeue_buffer(&mut self) -> io::Result<DequeuedBuffer>;

    /// Block up to `timeout` until a frame may be ready. Returns `false` on timeout.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Enter streaming mode
    fn stream_on(&mut self) -> io::Result<()>;

    /// Leave streaming mode
    fn stream_off(&mut self) -> io::Result<()>;
}

/// Run `op`, retrying while it reports an interrupted call
pub(crate) fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Whether a dequeue failure only means "nothing ready yet"
pub(crate) fn is_not_ready(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_interrupted_retries_only_eintr() {
        let mut attempts = 0;
        let result = retry_interrupted(|| {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result.expect("third attempt succeeds"), 3);

        let mut attempts = 0;
        let result: io::Result<()> = retry_interrupted(|| {
            attempts += 1;
            Err(io::Error::from_raw_os_error(libc::EINVAL))
        });
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_eagain_is_not_ready() {
        assert!(is_not_ready(&io::Error::from_raw_os_error(libc::EAGAIN)));
        assert!(!is_not_ready(&io::Error::from_raw_os_error(libc::EIO)));
    }
}
