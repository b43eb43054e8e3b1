//! Linux V4L2 implementation of [`VideoDevice`]

use super::device::{
    BufferLayout, Capabilities, DequeuedBuffer, MappedRegion, VideoDevice, retry_interrupted,
};
use super::format::{AppliedFormat, FieldOrder, FormatRequest, FourCC};
use super::sys;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};
use std::ffi::c_void;
use std::io;
use std::num::NonZeroUsize;
use std::os::fd::BorrowedFd;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::time::Duration;
use v4l::capability::Flags as CapFlags;
use v4l::format::FieldOrder as V4lFieldOrder;
use v4l::v4l_sys::{v4l2_buffer, v4l2_control, v4l2_requestbuffers};
use v4l::video::Capture;

/// An open `/dev/videoN` node.
///
/// The node is opened read/write and non-blocking; dropping the value closes it.
pub struct V4l2Device {
    device: v4l::Device,
}

impl V4l2Device {
    /// Open a device node by path
    pub fn open(path: &str) -> io::Result<Self> {
        let device = v4l::Device::with_path(path)?;
        tracing::debug!(path, "opened video device");
        Ok(Self { device })
    }

    fn fd(&self) -> c_int {
        self.device.handle().fd()
    }

    /// Issue a raw ioctl, retrying on EINTR
    fn xioctl<T>(&self, op: unsafe fn(c_int, T) -> nix::Result<c_int>, arg: T) -> io::Result<()>
    where
        T: Copy,
    {
        let fd = self.fd();
        retry_interrupted(|| {
            // SAFETY: `fd` is open for the lifetime of `self`, and every caller passes a pointer
            // to a live, correctly sized argument for the request encoded in `op`.
            unsafe { op(fd, arg) }
                .map(|_| ())
                .map_err(io::Error::from)
        })
    }

    fn stream_type() -> c_int {
        sys::CAPTURE as c_int
    }
}

impl VideoDevice for V4l2Device {
    type Region = Mapping;

    fn capabilities(&mut self) -> io::Result<Capabilities> {
        let caps = retry_interrupted(|| self.device.query_caps())?;
        Ok(Capabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(CapFlags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(CapFlags::STREAMING),
        })
    }

    fn apply_format(&mut self, request: &FormatRequest) -> io::Result<AppliedFormat> {
        let mut fmt = v4l::Format::new(
            request.width,
            request.height,
            request.pixel_format.fourcc().into(),
        );
        fmt.field_order = match request.field_order {
            FieldOrder::Progressive => V4lFieldOrder::Progressive,
        };

        // set_format re-reads the format after applying it
        let applied = retry_interrupted(|| self.device.set_format(&fmt))?;
        Ok(AppliedFormat {
            width: applied.width,
            height: applied.height,
            fourcc: FourCC::from(applied.fourcc),
            stride: applied.stride,
            size: applied.size,
        })
    }

    fn set_priority(&mut self, priority: u32) -> io::Result<u32> {
        self.xioctl(sys::vidioc_s_priority, &priority as *const u32)?;
        let mut applied = 0u32;
        self.xioctl(sys::vidioc_g_priority, &mut applied as *mut u32)?;
        Ok(applied)
    }

    fn set_control(&mut self, id: u32, value: i32) -> io::Result<i32> {
        let mut control = sys::control(id, value);
        self.xioctl(sys::vidioc_s_ctrl, &mut control as *mut v4l2_control)?;
        let mut readback = sys::control(id, 0);
        self.xioctl(sys::vidioc_g_ctrl, &mut readback as *mut v4l2_control)?;
        Ok(readback.value)
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        let mut request = sys::request_buffers(count);
        self.xioctl(sys::vidioc_reqbufs, &mut request as *mut v4l2_requestbuffers)?;
        Ok(request.count)
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferLayout> {
        let mut buf = sys::capture_buffer(index);
        self.xioctl(sys::vidioc_querybuf, &mut buf as *mut v4l2_buffer)?;
        Ok(BufferLayout {
            index: buf.index,
            length: buf.length,
            offset: sys::buffer_offset(&buf),
        })
    }

    fn map_buffer(&mut self, layout: &BufferLayout) -> io::Result<Mapping> {
        let len = NonZeroUsize::new(layout.length as usize).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "driver reported a zero-length buffer")
        })?;
        // SAFETY: the fd outlives this call; the kernel validates offset/length against the
        // buffer it allocated and the returned region is owned by `Mapping` until unmapped.
        let ptr = unsafe {
            let fd = BorrowedFd::borrow_raw(self.fd());
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                layout.offset as libc::off_t,
            )
        }
        .map_err(io::Error::from)?;

        Ok(Mapping {
            ptr,
            len: len.get(),
            index: layout.index,
        })
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        let mut buf = sys::capture_buffer(index);
        self.xioctl(sys::vidioc_qbuf, &mut buf as *mut v4l2_buffer)
    }

    fn dequeue_buffer(&mut self) -> io::Result<DequeuedBuffer> {
        let mut buf = sys::capture_buffer(0);
        self.xioctl(sys::vidioc_dqbuf, &mut buf as *mut v4l2_buffer)?;

        // V4L2 timestamps are never negative in practice
        let secs = buf.timestamp.tv_sec.max(0) as u64;
        let micros = buf.timestamp.tv_usec.max(0) as u64;
        Ok(DequeuedBuffer {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
            timestamp: Duration::from_secs(secs) + Duration::from_micros(micros),
        })
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        // SAFETY: the fd stays open for the duration of the poll call.
        let fd = unsafe { BorrowedFd::borrow_raw(self.fd()) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        loop {
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(ready) => return Ok(ready > 0),
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(io::Error::from(err)),
            }
        }
    }

    fn stream_on(&mut self) -> io::Result<()> {
        let kind = Self::stream_type();
        self.xioctl(sys::vidioc_streamon, &kind as *const c_int)
    }

    fn stream_off(&mut self) -> io::Result<()> {
        let kind = Self::stream_type();
        self.xioctl(sys::vidioc_streamoff, &kind as *const c_int)
    }
}

/// A V4L2 buffer mapped into the process. Unmapped on drop.
pub struct Mapping {
    ptr: NonNull<c_void>,
    len: usize,
    index: u32,
}

// SAFETY: the mapping is plain process memory; nothing ties it to the creating thread.
unsafe impl Send for Mapping {}

impl MappedRegion for Mapping {
    fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is a live PROT_READ mapping of exactly `len` bytes until drop.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<u8>(), self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: (ptr, len) is exactly the pair returned by mmap, and it is unmapped only here.
        if let Err(err) = unsafe { munmap(self.ptr, self.len) } {
            tracing::warn!(index = self.index, error = %err, "buffer unmap failed");
        } else {
            tracing::trace!(index = self.index, len = self.len, "buffer unmapped");
        }
    }
}
