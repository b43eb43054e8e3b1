//! Scriptable in-memory device for unit tests

use super::device::{BufferLayout, Capabilities, DequeuedBuffer, MappedRegion, VideoDevice};
use super::format::{AppliedFormat, FormatRequest, FourCC};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Device operation as observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Capabilities,
    ApplyFormat(u32, u32),
    SetPriority(u32),
    SetControl(u32, i32),
    RequestBuffers(u32),
    QueryBuffer(u32),
    Map(u32),
    Unmap(u32),
    Queue(u32),
    Dequeue(u32),
    DequeueNotReady,
    WaitReadable,
    StreamOn,
    StreamOff,
    Close,
}

/// Shared call log. Survives the device being moved or dropped.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Journal {
    fn record(&self, call: Call) {
        self.calls.lock().expect("journal lock").push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("journal lock").clone()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("journal lock").clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn unmap_count(&self) -> usize {
        self.unmapped_indices().len()
    }

    pub fn mapped_indices(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Map(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn unmapped_indices(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Unmap(i) => Some(i),
                _ => None,
            })
            .collect()
    }
}

/// Scripted outcome of one dequeue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueStep {
    /// Report "try again"
    NotReady,
    /// Hand out the oldest queued buffer with this used length
    Frame { bytes_used: u32 },
    /// Fail with an I/O error
    Fail,
}

/// Heap-backed stand-in for a mapped buffer; records its unmap on drop
#[derive(Debug)]
pub struct MockRegion {
    data: Vec<u8>,
    index: u32,
    journal: Journal,
}

impl MappedRegion for MockRegion {
    fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for MockRegion {
    fn drop(&mut self) {
        self.journal.record(Call::Unmap(self.index));
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::other(format!("injected {what} failure"))
}

fn invalid(what: &str) -> io::Error {
    tracing::trace!(what, "mock rejected call");
    io::Error::from_raw_os_error(libc::EINVAL)
}

/// In-memory capture device.
///
/// Buffers are handed back in FIFO order of queueing. Dequeue with nothing queued
/// fails with EINVAL rather than blocking, so a broken test cannot spin forever.
#[derive(Debug)]
pub struct MockDevice {
    journal: Journal,
    capabilities: Capabilities,
    fail_capabilities: bool,
    forced_resolution: Option<(u32, u32)>,
    forced_fourcc: Option<FourCC>,
    fail_format: bool,
    priority_readback: Option<u32>,
    control_overrides: HashMap<u32, i32>,
    granted: Option<u32>,
    fail_request: bool,
    fail_query_at: Option<u32>,
    fail_map_at: Option<u32>,
    fail_queue_at: Option<u32>,
    fail_requeue: bool,
    fail_queue_call: Option<u64>,
    queue_calls: u64,
    fail_stream_on: bool,
    fail_stream_off: bool,
    buffer_length: usize,
    buffer_count: u32,
    queued: VecDeque<u32>,
    script: VecDeque<DequeueStep>,
    dequeues: u64,
    sequence: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            capabilities: Capabilities {
                driver: "mock".to_string(),
                card: "Mock Camera".to_string(),
                bus_info: "platform:mock".to_string(),
                can_capture: true,
                can_stream: true,
            },
            fail_capabilities: false,
            forced_resolution: None,
            forced_fourcc: None,
            fail_format: false,
            priority_readback: None,
            control_overrides: HashMap::new(),
            granted: None,
            fail_request: false,
            fail_query_at: None,
            fail_map_at: None,
            fail_queue_at: None,
            fail_requeue: false,
            fail_queue_call: None,
            queue_calls: 0,
            fail_stream_on: false,
            fail_stream_off: false,
            buffer_length: 4096,
            buffer_count: 0,
            queued: VecDeque::new(),
            script: VecDeque::new(),
            dequeues: 0,
            sequence: 0,
        }
    }

    pub fn with_capabilities(mut self, can_capture: bool, can_stream: bool) -> Self {
        self.capabilities.can_capture = can_capture;
        self.capabilities.can_stream = can_stream;
        self
    }

    pub fn failing_capabilities(mut self) -> Self {
        self.fail_capabilities = true;
        self
    }

    pub fn with_forced_resolution(mut self, width: u32, height: u32) -> Self {
        self.forced_resolution = Some((width, height));
        self
    }

    pub fn with_forced_fourcc(mut self, fourcc: FourCC) -> Self {
        self.forced_fourcc = Some(fourcc);
        self
    }

    pub fn failing_format(mut self) -> Self {
        self.fail_format = true;
        self
    }

    pub fn with_priority_readback(mut self, priority: u32) -> Self {
        self.priority_readback = Some(priority);
        self
    }

    pub fn with_control_override(mut self, id: u32, value: i32) -> Self {
        self.control_overrides.insert(id, value);
        self
    }

    pub fn with_granted_buffers(mut self, count: u32) -> Self {
        self.granted = Some(count);
        self
    }

    pub fn with_buffer_length(mut self, length: usize) -> Self {
        self.buffer_length = length;
        self
    }

    pub fn failing_request(mut self) -> Self {
        self.fail_request = true;
        self
    }

    pub fn failing_query_at(mut self, index: u32) -> Self {
        self.fail_query_at = Some(index);
        self
    }

    pub fn failing_map_at(mut self, index: u32) -> Self {
        self.fail_map_at = Some(index);
        self
    }

    pub fn failing_queue_at(mut self, index: u32) -> Self {
        self.fail_queue_at = Some(index);
        self
    }

    /// Fail every queue request issued after the first dequeue
    pub fn failing_requeue(mut self) -> Self {
        self.fail_requeue = true;
        self
    }

    /// Fail only the `nth` queue request, counting from 1 across the device's life
    pub fn failing_queue_call(mut self, nth: u64) -> Self {
        self.fail_queue_call = Some(nth);
        self
    }

    pub fn failing_stream_on(mut self) -> Self {
        self.fail_stream_on = true;
        self
    }

    pub fn failing_stream_off(mut self) -> Self {
        self.fail_stream_off = true;
        self
    }

    pub fn with_dequeue_script(mut self, steps: impl IntoIterator<Item = DequeueStep>) -> Self {
        self.script.extend(steps);
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    /// Buffers currently owned by the device
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Byte every buffer `index` is pre-filled with
    pub fn fill_byte(index: u32) -> u8 {
        0x10u8.wrapping_add(index as u8)
    }

    fn take_frame(&mut self, bytes_used: u32) -> io::Result<DequeuedBuffer> {
        let index = self
            .queued
            .pop_front()
            .ok_or_else(|| invalid("dequeue with no queued buffers"))?;
        let sequence = self.sequence;
        self.dequeues += 1;
        self.sequence += 1;
        self.journal.record(Call::Dequeue(index));
        Ok(DequeuedBuffer {
            index,
            bytes_used,
            sequence,
            timestamp: Duration::from_millis(u64::from(sequence) * 33),
        })
    }
}

impl VideoDevice for MockDevice {
    type Region = MockRegion;

    fn capabilities(&mut self) -> io::Result<Capabilities> {
        self.journal.record(Call::Capabilities);
        if self.fail_capabilities {
            return Err(io::Error::from_raw_os_error(libc::ENOTTY));
        }
        Ok(self.capabilities.clone())
    }

    fn apply_format(&mut self, request: &FormatRequest) -> io::Result<AppliedFormat> {
        self.journal.record(Call::ApplyFormat(request.width, request.height));
        if self.fail_format {
            return Err(injected("format"));
        }
        let (width, height) = self
            .forced_resolution
            .unwrap_or((request.width, request.height));
        let fourcc = self.forced_fourcc.unwrap_or(request.pixel_format.fourcc());
        Ok(AppliedFormat {
            width,
            height,
            fourcc,
            stride: width * 2,
            size: width * height * 2,
        })
    }

    fn set_priority(&mut self, priority: u32) -> io::Result<u32> {
        self.journal.record(Call::SetPriority(priority));
        Ok(self.priority_readback.unwrap_or(priority))
    }

    fn set_control(&mut self, id: u32, value: i32) -> io::Result<i32> {
        self.journal.record(Call::SetControl(id, value));
        Ok(self.control_overrides.get(&id).copied().unwrap_or(value))
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        self.journal.record(Call::RequestBuffers(count));
        if self.fail_request {
            return Err(injected("buffer request"));
        }
        self.buffer_count = self.granted.unwrap_or(count);
        Ok(self.buffer_count)
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferLayout> {
        self.journal.record(Call::QueryBuffer(index));
        if self.fail_query_at == Some(index) {
            return Err(injected("buffer query"));
        }
        if index >= self.buffer_count {
            return Err(invalid("query beyond granted count"));
        }
        Ok(BufferLayout {
            index,
            length: self.buffer_length as u32,
            offset: index * self.buffer_length as u32,
        })
    }

    fn map_buffer(&mut self, layout: &BufferLayout) -> io::Result<MockRegion> {
        if self.fail_map_at == Some(layout.index) {
            return Err(injected("map"));
        }
        self.journal.record(Call::Map(layout.index));
        Ok(MockRegion {
            data: vec![Self::fill_byte(layout.index); layout.length as usize],
            index: layout.index,
            journal: self.journal.clone(),
        })
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        self.journal.record(Call::Queue(index));
        self.queue_calls += 1;
        if self.fail_queue_at == Some(index)
            || self.fail_queue_call == Some(self.queue_calls)
            || (self.fail_requeue && self.dequeues > 0)
        {
            return Err(injected("queue"));
        }
        if index >= self.buffer_count || self.queued.contains(&index) {
            return Err(invalid("queue of unknown or already queued buffer"));
        }
        self.queued.push_back(index);
        Ok(())
    }

    fn dequeue_buffer(&mut self) -> io::Result<DequeuedBuffer> {
        match self.script.pop_front() {
            Some(DequeueStep::NotReady) => {
                self.journal.record(Call::DequeueNotReady);
                Err(io::Error::from_raw_os_error(libc::EAGAIN))
            }
            Some(DequeueStep::Fail) => Err(io::Error::from_raw_os_error(libc::EIO)),
            Some(DequeueStep::Frame { bytes_used }) => self.take_frame(bytes_used),
            None => {
                let bytes_used = self.buffer_length as u32;
                self.take_frame(bytes_used)
            }
        }
    }

    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        self.journal.record(Call::WaitReadable);
        Ok(!self.queued.is_empty())
    }

    fn stream_on(&mut self) -> io::Result<()> {
        self.journal.record(Call::StreamOn);
        if self.fail_stream_on {
            return Err(injected("stream-on"));
        }
        Ok(())
    }

    fn stream_off(&mut self) -> io::Result<()> {
        self.journal.record(Call::StreamOff);
        if self.fail_stream_off {
            return Err(injected("stream-off"));
        }
        // Stream-off returns every buffer to the application
        self.queued.clear();
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.journal.record(Call::Close);
    }
}
