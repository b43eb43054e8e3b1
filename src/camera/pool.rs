//! Memory-mapped buffer pool shared with the device

use super::device::{MappedRegion, VideoDevice};
use crate::error::{Error, Result};
use tracing::{debug, error};

/// One mapped device buffer.
///
/// The region is valid for exactly `length` bytes and is never resized.
pub(crate) struct Buffer<R> {
    region: R,
    length: usize,
}

impl<R: MappedRegion> Buffer<R> {
    /// First `used` bytes of the buffer, clamped to its length
    pub(crate) fn filled(&self, used: usize) -> &[u8] {
        let slice = self.region.as_slice();
        &slice[..used.min(self.length).min(slice.len())]
    }

    pub(crate) fn length(&self) -> usize {
        self.length
    }
}

/// Fixed-capacity collection of mapped buffers.
///
/// `buffers.len()` is the running mapped count; only live mappings are stored, so
/// every index `< count` refers to a valid region. The count only grows during
/// [`BufferPool::allocate`] and only shrinks during teardown.
pub(crate) struct BufferPool<R: MappedRegion> {
    buffers: Vec<Buffer<R>>,
    count_max: usize,
}

impl<R: MappedRegion> BufferPool<R> {
    /// Request `requested` buffers from the device and map each one in index order.
    ///
    /// Stops at the first query or mapping failure; buffers mapped so far are
    /// unmapped when the partial pool is dropped on the error path.
    pub(crate) fn allocate<D>(device: &mut D, requested: u32) -> Result<Self>
    where
        D: VideoDevice<Region = R>,
    {
        let granted = device.request_buffers(requested).map_err(|e| {
            error!(error = %e, "buffer request failed");
            Error::BufferRequest(e)
        })?;
        if granted == 0 {
            error!(requested, "device granted no buffers");
            return Err(Error::BufferRequest(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "device granted no buffers",
            )));
        }
        if granted != requested {
            debug!(requested, granted, "device adjusted buffer count");
        }

        let count_max = granted as usize;
        let mut buffers = Vec::new();
        buffers.try_reserve_exact(count_max).map_err(|e| {
            error!(error = %e, "unable to allocate memory for buffer slots");
            Error::Allocation(e.to_string())
        })?;
        let mut pool = Self { buffers, count_max };

        for index in 0..granted {
            let layout = device.query_buffer(index).map_err(|e| {
                error!(index, error = %e, "buffer query failed");
                Error::BufferQuery { index, source: e }
            })?;

            let region = device.map_buffer(&layout).map_err(|e| {
                error!(index, error = %e, "buffer map failed");
                Error::BufferMap { index, source: e }
            })?;

            pool.buffers.push(Buffer {
                region,
                length: layout.length as usize,
            });
            debug!(index, length = layout.length, offset = layout.offset, "buffer mapped");
        }

        Ok(pool)
    }

    /// Hand every mapped buffer to the device, in index order
    pub(crate) fn queue_all<D>(&self, device: &mut D) -> Result<()>
    where
        D: VideoDevice<Region = R>,
    {
        for index in 0..self.count() as u32 {
            device.queue_buffer(index).map_err(|e| {
                error!(index, error = %e, "buffer queue failed");
                Error::BufferEnqueue { index, source: e }
            })?;
        }
        Ok(())
    }

    /// Number of currently mapped buffers
    pub(crate) fn count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of buffers the device granted
    pub(crate) fn count_max(&self) -> usize {
        self.count_max
    }

    /// Mapped buffer at `index`, if it is live
    pub(crate) fn get(&self, index: u32) -> Option<&Buffer<R>> {
        self.buffers.get(index as usize)
    }

    /// Unmap buffers from `count - 1` down to 0, then release the slot storage
    pub(crate) fn teardown(&mut self) {
        let unmapped = self.buffers.len();
        while let Some(buffer) = self.buffers.pop() {
            drop(buffer);
        }
        self.buffers = Vec::new();
        if unmapped > 0 {
            debug!(unmapped, count_max = self.count_max, "buffer pool released");
        }
    }
}

impl<R: MappedRegion> Drop for BufferPool<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}
