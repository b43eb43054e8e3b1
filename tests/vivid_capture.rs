//! Integration tests against the vivid virtual capture driver.
//!
//! Requires `cargo test --features integration`, the `vivid` module loaded
//! (`sudo modprobe vivid`), and read/write access to its `/dev/video*` node.
//! Tests fail rather than skip when vivid is missing.

#![cfg(feature = "integration")]

use mmapcam::{Camera, CameraConfig, Error, PixelFormat, WaitStrategy};
use serial_test::serial;
use std::fs;
use std::path::Path;

/// Index of the first vivid capture node, found through sysfs
fn find_vivid_device() -> Option<i32> {
    let video4linux = Path::new("/sys/class/video4linux");
    (0..16).find(|index| {
        let name_path = video4linux.join(format!("video{index}")).join("name");
        fs::read_to_string(name_path)
            .map(|name| name.to_lowercase().contains("vivid"))
            .unwrap_or(false)
    })
}

macro_rules! require_vivid {
    () => {
        match find_vivid_device() {
            Some(index) => index,
            None => panic!(
                "vivid virtual camera not available.\n\
                 Load it with: sudo modprobe vivid\n\
                 Or run unit tests only: cargo test --lib"
            ),
        }
    };
}

fn vivid_config(index: i32) -> CameraConfig {
    CameraConfig::default()
        .with_device_index(index)
        .with_format(PixelFormat::Yuyv, 640, 480)
}

#[test]
#[serial]
fn opens_and_negotiates_yuyv() {
    let index = require_vivid!();
    let mut camera = Camera::open(&vivid_config(index)).expect("vivid setup succeeds");

    let format = camera.format().expect("camera is live");
    assert_eq!((format.width, format.height), (640, 480));
    assert_eq!(format.pixel_format, PixelFormat::Yuyv);
    assert!(format.frame_size >= 640 * 480 * 2);
    assert!(camera.buffer_count() >= 2);
    assert_eq!(camera.capabilities().expect("camera is live").driver, "vivid");

    camera.destroy().expect("destroy succeeds");
    assert!(matches!(camera.destroy(), Err(Error::ObjectNotExtant)));
}

#[test]
#[serial]
fn captures_frames_with_both_wait_strategies() {
    let index = require_vivid!();
    for wait in [WaitStrategy::Spin, WaitStrategy::default()] {
        let config = vivid_config(index).with_wait(wait);
        let mut camera = Camera::open(&config).expect("vivid setup succeeds");
        camera.start().expect("stream-on succeeds");

        let mut last_sequence = None;
        for _ in 0..5 {
            let (len, sequence) = camera
                .capture_with(|frame| (frame.len(), frame.sequence()))
                .expect("capture succeeds");
            assert_eq!(len, 640 * 480 * 2);
            if let Some(previous) = last_sequence {
                assert!(sequence > previous, "sequence numbers must increase");
            }
            last_sequence = Some(sequence);
        }

        camera.stop().expect("stream-off succeeds");
        camera.destroy().expect("destroy succeeds");
    }
}

#[test]
#[serial]
fn copy_variant_truncates_to_destination() {
    let index = require_vivid!();
    let mut camera = Camera::open(&vivid_config(index)).expect("vivid setup succeeds");
    camera.start().expect("stream-on succeeds");

    let mut small = vec![0u8; 1024];
    assert_eq!(camera.capture_into(&mut small).expect("capture succeeds"), 1024);

    let frame = camera.capture_bytes().expect("capture succeeds");
    assert_eq!(frame.len(), 640 * 480 * 2);
}

#[test]
#[serial]
fn restart_after_stop_keeps_capturing() {
    let index = require_vivid!();
    let mut camera = Camera::open(&vivid_config(index)).expect("vivid setup succeeds");

    camera.start().expect("first stream-on succeeds");
    camera.skip_frame().expect("capture succeeds");
    camera.stop().expect("stream-off succeeds");
    assert!(matches!(camera.skip_frame(), Err(Error::NotStreaming)));

    camera.start().expect("second stream-on succeeds");
    camera.skip_frame().expect("capture after restart succeeds");
}

#[test]
#[serial]
fn unsupported_resolution_is_rejected() {
    let index = require_vivid!();
    // vivid clamps odd sizes to its supported frame sizes
    let config = vivid_config(index).with_format(PixelFormat::Yuyv, 641, 479);
    match Camera::open(&config) {
        Err(Error::ResolutionMismatch { .. }) => {}
        Err(other) => panic!("expected resolution mismatch, got {other}"),
        Ok(_) => panic!("vivid accepted 641x479 unchanged"),
    }

    // The node must be free again for the next open
    let camera = Camera::open(&vivid_config(index)).expect("reopen after failure succeeds");
    drop(camera);
}

#[test]
#[serial]
fn missing_device_reports_open_failure() {
    let config = CameraConfig::default().with_device_index(4095);
    assert!(matches!(
        Camera::open(&config),
        Err(Error::DeviceOpen { .. })
    ));
}
