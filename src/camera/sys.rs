//! Buffer and streaming ioctls over the `v4l` crate's kernel bindings
//!
//! Capability and format requests go through `v4l` directly; the buffer
//! lifecycle issues the raw requests declared here.

use std::mem;
use std::os::raw::c_int;
use v4l::buffer::Type as BufferType;
use v4l::memory::Memory;
use v4l::v4l_sys::{v4l2_buffer, v4l2_control, v4l2_requestbuffers};

/// `V4L2_BUF_TYPE_VIDEO_CAPTURE`
pub const CAPTURE: u32 = BufferType::VideoCapture as u32;
/// `V4L2_MEMORY_MMAP`
pub const MMAP: u32 = Memory::Mmap as u32;

/// Buffer request for `count` mmap capture buffers
pub fn request_buffers(count: u32) -> v4l2_requestbuffers {
    // SAFETY: plain C struct, all-zero is its documented initial state.
    let mut request: v4l2_requestbuffers = unsafe { mem::zeroed() };
    request.count = count;
    request.type_ = CAPTURE;
    request.memory = MMAP;
    request
}

/// Zeroed descriptor for mmap capture buffer `index`
pub fn capture_buffer(index: u32) -> v4l2_buffer {
    // SAFETY: plain C struct and union, all-zero is valid for every member.
    let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
    buf.index = index;
    buf.type_ = CAPTURE;
    buf.memory = MMAP;
    buf
}

/// Mapping offset; only meaningful for mmap buffers
pub fn buffer_offset(buf: &v4l2_buffer) -> u32 {
    // SAFETY: every union member is plain data; for MMAP buffers the kernel fills `offset`.
    unsafe { buf.m.offset }
}

/// Control carrying `value` for control `id`
pub fn control(id: u32, value: i32) -> v4l2_control {
    // SAFETY: plain C struct.
    let mut control: v4l2_control = unsafe { mem::zeroed() };
    control.id = id;
    control.value = value;
    control
}

nix::ioctl_readwrite!(vidioc_reqbufs, b'V', 8, v4l2_requestbuffers);
nix::ioctl_readwrite!(vidioc_querybuf, b'V', 9, v4l2_buffer);
nix::ioctl_readwrite!(vidioc_qbuf, b'V', 15, v4l2_buffer);
nix::ioctl_readwrite!(vidioc_dqbuf, b'V', 17, v4l2_buffer);
nix::ioctl_write_ptr!(vidioc_streamon, b'V', 18, c_int);
nix::ioctl_write_ptr!(vidioc_streamoff, b'V', 19, c_int);
nix::ioctl_readwrite!(vidioc_g_ctrl, b'V', 27, v4l2_control);
nix::ioctl_readwrite!(vidioc_s_ctrl, b'V', 28, v4l2_control);
nix::ioctl_read!(vidioc_g_priority, b'V', 67, u32);
nix::ioctl_write_ptr!(vidioc_s_priority, b'V', 68, u32);
