//! Error types for mmapcam operations

use std::io;
use thiserror::Error;

/// Result type alias using mmapcam's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Every way constructing, driving or tearing down a camera can fail
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied unusable input (zero dimension, negative device index, ...)
    #[error("Invalid input: {0}")]
    InputBad(String),

    /// Could not reserve memory for bookkeeping
    #[error("Memory allocation failed: {0}")]
    Allocation(String),

    /// The device node could not be opened
    #[error("Unable to open device {path}: {source}")]
    DeviceOpen {
        /// Device node path
        path: String,
        /// OS error
        source: io::Error,
    },

    /// The capability query was rejected; the node is not a video capture device
    #[error("Not a video capture device: {0}")]
    DeviceInvalid(#[source] io::Error),

    /// Device lacks the video capture capability
    #[error("Device cannot capture video")]
    NoVideoCapture,

    /// Device lacks the streaming I/O capability
    #[error("Device cannot stream")]
    NoStreaming,

    /// The driver refused the requested format
    #[error("Format application failed: {0}")]
    FormatApply(#[source] io::Error),

    /// The driver applied a different pixel format than requested
    #[error("Driver set different pixel format ({applied}, requested {requested})")]
    PixelFormatMismatch {
        /// FourCC requested
        requested: String,
        /// FourCC applied by the driver
        applied: String,
    },

    /// The driver applied a different resolution than requested
    #[error("Driver set different resolution ({applied_width}x{applied_height}, requested {requested_width}x{requested_height})")]
    ResolutionMismatch {
        /// Requested width
        requested_width: u32,
        /// Requested height
        requested_height: u32,
        /// Width applied by the driver
        applied_width: u32,
        /// Height applied by the driver
        applied_height: u32,
    },

    /// Access priority could not be set
    #[error("Priority application failed: {0}")]
    PrioritySet(#[source] io::Error),

    /// Driver reports a different access priority than requested
    #[error("Driver set priority {applied}, requested {requested}")]
    PriorityMismatch {
        /// Requested priority value
        requested: u32,
        /// Priority read back from the driver
        applied: u32,
    },

    /// A device control could not be set or read back
    #[error("Control {id:#010x} could not be applied: {source}")]
    ControlSet {
        /// Control identifier
        id: u32,
        /// OS error
        source: io::Error,
    },

    /// A device control reads back a different value than requested
    #[error("Control {id:#010x} reads back {applied}, requested {requested}")]
    ControlMismatch {
        /// Control identifier
        id: u32,
        /// Requested value
        requested: i32,
        /// Value read back
        applied: i32,
    },

    /// Buffer request was refused
    #[error("Buffer request failed: {0}")]
    BufferRequest(#[source] io::Error),

    /// Buffer descriptor query failed
    #[error("Buffer {index} query failed: {source}")]
    BufferQuery {
        /// Buffer index
        index: u32,
        /// OS error
        source: io::Error,
    },

    /// Buffer could not be mapped into the process
    #[error("Buffer {index} map failed: {source}")]
    BufferMap {
        /// Buffer index
        index: u32,
        /// OS error
        source: io::Error,
    },

    /// Buffer could not be handed (back) to the device
    #[error("Buffer {index} enqueue failed: {source}")]
    BufferEnqueue {
        /// Buffer index
        index: u32,
        /// OS error
        source: io::Error,
    },

    /// A completed buffer could not be taken from the device
    #[error("Unable to dequeue buffer: {0}")]
    BufferDequeue(#[source] io::Error),

    /// Stream-on request failed
    #[error("Unable to start streaming: {0}")]
    StartFailed(#[source] io::Error),

    /// Stream-off request failed
    #[error("Unable to stop streaming: {0}")]
    StopFailed(#[source] io::Error),

    /// The camera was never constructed or has already been destroyed
    #[error("Camera not extant")]
    ObjectNotExtant,

    /// Operation requires a streaming camera
    #[error("Camera is not streaming")]
    NotStreaming,

    /// Stream-on issued while already streaming
    #[error("Camera is already streaming")]
    AlreadyStreaming,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error was raised before any device interaction took place
    pub fn is_input(&self) -> bool {
        matches!(self, Error::InputBad(_) | Error::Config(_))
    }

    /// Whether this error came from the format negotiation step
    pub fn is_negotiation(&self) -> bool {
        matches!(
            self,
            Error::FormatApply(_)
                | Error::PixelFormatMismatch { .. }
                | Error::ResolutionMismatch { .. }
        )
    }
}
