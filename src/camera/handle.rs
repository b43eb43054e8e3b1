//! The camera aggregate: one device, its negotiated format, and its buffer pool

use super::capture::{CaptureEngine, Frame};
use super::config::CameraConfig;
use super::device::{Capabilities, VideoDevice};
use super::format::NegotiatedFormat;
use super::negotiate::negotiate;
use super::pool::BufferPool;
use super::stream::{StreamController, StreamState};
use super::v4l2::V4l2Device;
use crate::error::{Error, Result};
use bytes::Bytes;
use tracing::{debug, error, info, warn};

/// Live state of a constructed camera.
///
/// Field order matters: the pool is dropped, and so unmapped, before the device closes.
struct Inner<D: VideoDevice> {
    pool: BufferPool<D::Region>,
    device: D,
    format: NegotiatedFormat,
    capabilities: Capabilities,
    stream: StreamController,
    engine: CaptureEngine,
    // Stream-off hands every buffer back to the application
    requeue_on_start: bool,
}

impl<D: VideoDevice> Inner<D> {
    fn shutdown(mut self, label: &str) {
        if self.stream.is_streaming() {
            if let Err(e) = self.stream.stop(&mut self.device) {
                warn!(device = label, error = %e, "stream-off during teardown failed, continuing");
            }
        }
        self.pool.teardown();
        drop(self);
        info!(device = label, "camera closed");
    }
}

/// An open capture device with mapped, queued buffers.
///
/// Construction either returns a fully usable camera or releases everything it
/// acquired. Capture failures leave the camera intact so the caller can retry or
/// call [`Camera::destroy`].
///
/// ```no_run
/// use mmapcam::{Camera, CameraConfig};
///
/// # fn main() -> mmapcam::Result<()> {
/// let mut camera = Camera::open(&CameraConfig::default())?;
/// camera.start()?;
/// let len = camera.capture_with(|frame| frame.len())?;
/// println!("captured {len} bytes");
/// camera.stop()?;
/// camera.destroy()?;
/// # Ok(())
/// # }
/// ```
pub struct Camera<D: VideoDevice = V4l2Device> {
    inner: Option<Inner<D>>,
    label: String,
}

impl Camera<V4l2Device> {
    /// Validate `config`, open `/dev/video{index}`, and run the full setup protocol
    pub fn open(config: &CameraConfig) -> Result<Self> {
        config.validate()?;
        let path = config.device_path();
        let device = V4l2Device::open(&path).map_err(|source| {
            error!(path = %path, error = %source, "unable to open device");
            Error::DeviceOpen {
                path: path.clone(),
                source,
            }
        })?;
        Self::setup(device, config, path)
    }
}

impl<D: VideoDevice> Camera<D> {
    /// Run the setup protocol over an already-open device.
    ///
    /// The device is closed if setup fails.
    pub fn with_device(device: D, config: &CameraConfig) -> Result<Self> {
        config.validate()?;
        Self::setup(device, config, config.device_path())
    }

    fn setup(mut device: D, config: &CameraConfig, label: String) -> Result<Self> {
        debug!(
            device = %label,
            format = %config.format,
            width = config.width,
            height = config.height,
            "configuring camera"
        );

        let negotiated = negotiate(&mut device, config)?;
        // Declared after `device`, so an early return unmaps before the device closes
        let pool = BufferPool::allocate(&mut device, config.buffer_count)?;
        pool.queue_all(&mut device)?;

        info!(
            device = %label,
            card = %negotiated.capabilities.card,
            format = %negotiated.format,
            buffers = pool.count(),
            "camera ready"
        );

        Ok(Self {
            inner: Some(Inner {
                pool,
                device,
                format: negotiated.format,
                capabilities: negotiated.capabilities,
                stream: StreamController::default(),
                engine: CaptureEngine::new(config.wait),
                requeue_on_start: false,
            }),
            label,
        })
    }

    fn live(&self) -> Result<&Inner<D>> {
        self.inner.as_ref().ok_or(Error::ObjectNotExtant)
    }

    fn live_mut(&mut self) -> Result<&mut Inner<D>> {
        self.inner.as_mut().ok_or(Error::ObjectNotExtant)
    }

    fn streaming_mut(&mut self) -> Result<&mut Inner<D>> {
        let inner = self.live_mut()?;
        if !inner.stream.is_streaming() {
            return Err(Error::NotStreaming);
        }
        Ok(inner)
    }

    /// Enter streaming mode
    pub fn start(&mut self) -> Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(Error::ObjectNotExtant);
        };
        if inner.requeue_on_start && !inner.stream.is_streaming() {
            if let Err(e) = inner.pool.queue_all(&mut inner.device) {
                // Reclaim the buffers queued so far so the next start begins from none
                if let Err(off) = inner.device.stream_off() {
                    warn!(
                        device = %self.label,
                        error = %off,
                        "stream-off after failed requeue failed"
                    );
                }
                return Err(e);
            }
            inner.requeue_on_start = false;
        }
        inner.stream.start(&mut inner.device)
    }

    /// Leave streaming mode. Buffers are requeued on the next [`Camera::start`].
    pub fn stop(&mut self) -> Result<()> {
        let inner = self.live_mut()?;
        inner.stream.stop(&mut inner.device)?;
        inner.requeue_on_start = true;
        Ok(())
    }

    /// Block until a frame is ready, pass it to `on_frame`, then return its buffer
    /// to the device.
    ///
    /// The frame borrows device memory and cannot outlive the callback.
    pub fn capture_with<F, T>(&mut self, on_frame: F) -> Result<T>
    where
        F: for<'f> FnOnce(Frame<'f>) -> T,
    {
        let inner = self.streaming_mut()?;
        inner.engine.capture(&mut inner.device, &inner.pool, on_frame)
    }

    /// Dequeue and requeue one frame without looking at it
    pub fn skip_frame(&mut self) -> Result<()> {
        self.capture_with(|_| ())
    }

    /// Copy one frame into `dest`, truncating silently if it does not fit.
    ///
    /// Returns the number of bytes written.
    pub fn capture_into(&mut self, dest: &mut [u8]) -> Result<usize> {
        let inner = self.streaming_mut()?;
        inner.engine.capture_into(&mut inner.device, &inner.pool, dest)
    }

    /// Capture one frame into an owned buffer
    pub fn capture_bytes(&mut self) -> Result<Bytes> {
        self.capture_with(|frame| Bytes::copy_from_slice(frame.data()))
    }

    /// Stop streaming if needed, unmap every buffer, and close the device.
    ///
    /// A second call reports [`Error::ObjectNotExtant`].
    pub fn destroy(&mut self) -> Result<()> {
        let Some(inner) = self.inner.take() else {
            warn!(device = %self.label, "destroy called on a camera that was already destroyed");
            return Err(Error::ObjectNotExtant);
        };
        inner.shutdown(&self.label);
        Ok(())
    }

    /// Whether the camera still owns its device
    pub fn is_extant(&self) -> bool {
        self.inner.is_some()
    }

    /// Device path or label the camera was built with
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Negotiated format
    pub fn format(&self) -> Result<&NegotiatedFormat> {
        self.live().map(|inner| &inner.format)
    }

    /// Capabilities reported during setup
    pub fn capabilities(&self) -> Result<&Capabilities> {
        self.live().map(|inner| &inner.capabilities)
    }

    /// Number of mapped buffers; zero once destroyed
    pub fn buffer_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.pool.count())
    }

    /// Number of buffers granted by the device; zero once destroyed
    pub fn buffer_capacity(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.pool.count_max())
    }

    /// Current streaming state
    pub fn stream_state(&self) -> StreamState {
        self.inner
            .as_ref()
            .map_or(StreamState::Idle, |inner| inner.stream.state())
    }

    /// Whether the device is streaming
    pub fn is_streaming(&self) -> bool {
        self.stream_state() == StreamState::Streaming
    }
}

impl<D: VideoDevice> Drop for Camera<D> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.shutdown(&self.label);
        }
    }
}

impl<D: VideoDevice> std::fmt::Debug for Camera<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("label", &self.label)
            .field("format", &self.inner.as_ref().map(|inner| &inner.format))
            .field("buffers", &self.buffer_count())
            .field("state", &self.stream_state())
            .finish()
    }
}
