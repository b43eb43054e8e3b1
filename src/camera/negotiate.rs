//! Capability verification and format negotiation

use super::config::{CameraConfig, ControlSetting, Priority};
use super::device::{Capabilities, VideoDevice};
use super::format::{FormatRequest, NegotiatedFormat, PixelFormat};
use crate::error::{Error, Result};
use tracing::{debug, error, info};

/// Reject devices that cannot capture or cannot stream
pub fn verify_capabilities<D: VideoDevice>(device: &mut D) -> Result<Capabilities> {
    let caps = device.capabilities().map_err(|e| {
        error!(error = %e, "capability query failed, not a video capture device");
        Error::DeviceInvalid(e)
    })?;

    if !caps.can_capture {
        error!(card = %caps.card, "device cannot capture video");
        return Err(Error::NoVideoCapture);
    }
    if !caps.can_stream {
        error!(card = %caps.card, "device cannot stream");
        return Err(Error::NoStreaming);
    }

    debug!(driver = %caps.driver, card = %caps.card, bus = %caps.bus_info, "capabilities verified");
    Ok(caps)
}

/// Submit `request` and accept only an exact match.
///
/// There is no fallback: a driver-adjusted pixel format or resolution fails the
/// negotiation and the caller must retry with different parameters.
pub fn negotiate_format<D: VideoDevice>(
    device: &mut D,
    request: &FormatRequest,
) -> Result<NegotiatedFormat> {
    let applied = device.apply_format(request).map_err(|e| {
        error!(error = %e, "format application failed");
        Error::FormatApply(e)
    })?;

    let requested_fourcc = request.pixel_format.fourcc();
    if applied.fourcc != requested_fourcc {
        error!(
            applied = %applied.fourcc,
            requested = %requested_fourcc,
            "driver set different pixel format"
        );
        return Err(Error::PixelFormatMismatch {
            requested: requested_fourcc.to_string(),
            applied: applied.fourcc.to_string(),
        });
    }
    if applied.width != request.width || applied.height != request.height {
        error!(
            width = applied.width,
            height = applied.height,
            "driver set different resolution"
        );
        return Err(Error::ResolutionMismatch {
            requested_width: request.width,
            requested_height: request.height,
            applied_width: applied.width,
            applied_height: applied.height,
        });
    }

    // Only the three supported formats can match the request above
    let pixel_format = PixelFormat::from_fourcc(applied.fourcc).unwrap_or(request.pixel_format);
    let negotiated = NegotiatedFormat {
        width: applied.width,
        height: applied.height,
        pixel_format,
        field_order: request.field_order,
        stride: applied.stride,
        frame_size: applied.size,
    };
    info!(format = %negotiated, frame_size = negotiated.frame_size, "format negotiated");
    Ok(negotiated)
}

/// Claim an access priority and verify the driver granted it
pub fn apply_priority<D: VideoDevice>(device: &mut D, priority: Priority) -> Result<()> {
    let requested = priority.as_raw();
    let applied = device.set_priority(requested).map_err(|e| {
        if e.raw_os_error() == Some(libc::EBUSY) {
            error!(error = %e, "another file handle already has priority");
        } else {
            error!(error = %e, "priority application failed");
        }
        Error::PrioritySet(e)
    })?;

    if applied != requested {
        error!(applied, requested, "driver set different priority");
        return Err(Error::PriorityMismatch { requested, applied });
    }
    debug!(?priority, "priority applied");
    Ok(())
}

/// Set each control in order, verifying the value read back
pub fn apply_controls<D: VideoDevice>(device: &mut D, controls: &[ControlSetting]) -> Result<()> {
    for control in controls {
        let applied = device.set_control(control.id, control.value).map_err(|e| {
            error!(id = control.id, error = %e, "unable to set control");
            Error::ControlSet {
                id: control.id,
                source: e,
            }
        })?;

        if applied != control.value {
            error!(
                id = control.id,
                applied,
                requested = control.value,
                "control reads back a different value"
            );
            return Err(Error::ControlMismatch {
                id: control.id,
                requested: control.value,
                applied,
            });
        }
        debug!(id = control.id, value = applied, "control applied");
    }
    Ok(())
}

/// Everything negotiated before buffers are requested
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// Capabilities reported by the device
    pub capabilities: Capabilities,
    /// Accepted format
    pub format: NegotiatedFormat,
}

/// Capability check, format, priority, then controls
pub fn negotiate<D: VideoDevice>(device: &mut D, config: &CameraConfig) -> Result<Negotiated> {
    let capabilities = verify_capabilities(device)?;
    let format = negotiate_format(device, &config.format_request())?;
    if let Some(priority) = config.priority {
        apply_priority(device, priority)?;
    }
    apply_controls(device, &config.controls)?;

    Ok(Negotiated {
        capabilities,
        format,
    })
}
