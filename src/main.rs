//! mmapcam command-line capture tool

use anyhow::Context;
use clap::Parser;
use mmapcam::{Camera, CaptureStats, MmapcamConfig, PixelFormat, logging};
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "mmapcam",
    version,
    about = "Capture frames from a V4L2 device through memory-mapped buffers"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to mmapcam.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override camera by index (/dev/videoN)
    #[arg(long, value_name = "INDEX")]
    device_index: Option<i32>,

    /// Override pixel format (mjpeg, uyvy, yuyv)
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// Override frame width in pixels
    #[arg(long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Override frame height in pixels
    #[arg(long, value_name = "PIXELS")]
    height: Option<u32>,

    /// Override the number of buffers to request
    #[arg(long, value_name = "N")]
    buffers: Option<u32>,

    /// Number of frames to capture
    #[arg(long, value_name = "N", default_value_t = 30)]
    frames: u64,

    /// Append raw frames to this file
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print the negotiated setup and exit without streaming
    #[arg(long)]
    probe: bool,

    /// Output results as JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MmapcamConfig::load(cli.config.as_deref())?;

    if let Some(index) = cli.device_index {
        config.camera.device_index = Some(index);
    }
    if let Some(format) = &cli.format {
        // Reject early so the message names the flag rather than the config layer
        PixelFormat::parse(format)
            .with_context(|| format!("unknown --format '{format}', use mjpeg, uyvy, or yuyv"))?;
        config.camera.format = Some(format.clone());
    }
    if let Some(width) = cli.width {
        config.camera.width = Some(width);
    }
    if let Some(height) = cli.height {
        config.camera.height = Some(height);
    }
    if let Some(buffers) = cli.buffers {
        config.camera.buffer_count = Some(buffers);
    }

    logging::init(&config.logging)?;

    let camera_config = config.camera_config()?;
    info!(?camera_config, "Starting capture");

    let mut camera = Camera::open(&camera_config)
        .with_context(|| format!("failed to set up {}", camera_config.device_path()))?;

    if cli.probe {
        print_probe(&camera, cli.json)?;
        camera.destroy()?;
        return Ok(());
    }

    let mut sink = cli.output.as_deref().map(open_output).transpose()?;

    camera.start()?;
    let stats = capture_frames(&mut camera, cli.frames, sink.as_mut());
    if let Err(err) = camera.stop() {
        warn!(error = %err, "stream-off failed");
    }
    camera.destroy()?;
    let stats = stats?;

    let summary = stats.summary();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }

    if summary.failures > 0 {
        anyhow::bail!("capture stopped after {} of {} frames", summary.frames, cli.frames);
    }
    Ok(())
}

fn open_output(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open output file {}", path.display()))
}

fn capture_frames(
    camera: &mut Camera,
    frames: u64,
    mut sink: Option<&mut File>,
) -> anyhow::Result<CaptureStats> {
    let mut stats = CaptureStats::new();

    while stats.frames() < frames {
        let written = camera.capture_with(|frame| match sink.as_deref_mut() {
            Some(file) => file.write_all(frame.data()).map(|()| frame.len()),
            None => Ok(frame.len()),
        });

        match written {
            Ok(Ok(len)) => stats.record_frame(len),
            Ok(Err(err)) => return Err(err).context("failed to write frame"),
            Err(err) => {
                stats.record_failure();
                error!(error = %err, "capture failed, stopping");
                break;
            }
        }
    }

    if let Some(file) = sink {
        file.flush().context("failed to flush output file")?;
    }
    Ok(stats)
}

fn print_probe(camera: &Camera, json: bool) -> anyhow::Result<()> {
    let format = camera.format()?;
    let caps = camera.capabilities()?;

    if json {
        let probe = json!({
            "device": camera.label(),
            "capabilities": caps,
            "format": format,
            "buffers": camera.buffer_count(),
        });
        println!("{}", serde_json::to_string_pretty(&probe)?);
    } else {
        println!("device:   {}", camera.label());
        println!("card:     {} ({})", caps.card, caps.driver);
        println!("bus:      {}", caps.bus_info);
        println!("format:   {format}");
        println!("stride:   {} bytes", format.stride);
        println!("frame:    {} bytes", format.frame_size);
        println!("buffers:  {}", camera.buffer_count());
    }
    Ok(())
}
