//! Pixel formats and the format a device agreed to

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel format for camera capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Motion JPEG (compressed, variable frame size)
    Mjpeg,
    /// UYVY 4:2:2 packed
    Uyvy,
    /// YUYV 4:2:2 packed
    Yuyv,
}

impl PixelFormat {
    /// Every supported format, in declaration order
    pub const ALL: [PixelFormat; 3] = [PixelFormat::Mjpeg, PixelFormat::Uyvy, PixelFormat::Yuyv];

    /// V4L2 FourCC code for this format
    pub fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Mjpeg => FourCC(*b"MJPG"),
            PixelFormat::Uyvy => FourCC(*b"UYVY"),
            PixelFormat::Yuyv => FourCC(*b"YUYV"),
        }
    }

    /// Reverse lookup from a FourCC the driver reported
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.fourcc() == fourcc)
    }

    /// Canonical string representation for configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Mjpeg => "mjpeg",
            PixelFormat::Uyvy => "uyvy",
            PixelFormat::Yuyv => "yuyv",
        }
    }

    /// Parse from a user-provided string (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mjpeg" | "mjpg" => Some(PixelFormat::Mjpeg),
            "uyvy" => Some(PixelFormat::Uyvy),
            "yuyv" | "yuy2" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-character code identifying a pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Little-endian packing used by the kernel ABI
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Field order requested from every device. Interlaced capture is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrder {
    /// Progressive frames (`V4L2_FIELD_NONE`)
    Progressive,
}

/// Format the device was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRequest {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub pixel_format: PixelFormat,
    /// Field order
    pub field_order: FieldOrder,
}

impl FormatRequest {
    /// Progressive request for the given geometry
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_format,
            field_order: FieldOrder::Progressive,
        }
    }
}

/// Format the device reports after applying a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedFormat {
    /// Applied width in pixels
    pub width: u32,
    /// Applied height in pixels
    pub height: u32,
    /// Applied pixel layout
    pub fourcc: FourCC,
    /// Bytes per line
    pub stride: u32,
    /// Maximum bytes per frame
    pub size: u32,
}

/// Format accepted during construction. Immutable for the camera's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NegotiatedFormat {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub pixel_format: PixelFormat,
    /// Field order
    pub field_order: FieldOrder,
    /// Bytes per line reported by the driver
    pub stride: u32,
    /// Maximum frame size reported by the driver
    pub frame_size: u32,
}

impl NegotiatedFormat {
    /// Whether this format is exactly what `request` asked for
    pub fn satisfies(&self, request: &FormatRequest) -> bool {
        self.width == request.width
            && self.height == request.height
            && self.pixel_format == request.pixel_format
            && self.field_order == request.field_order
    }
}

impl fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
    }
}
