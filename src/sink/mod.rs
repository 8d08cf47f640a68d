//! Video sinks for the tracking overlay.
//!
//! - Image sequence: numbered PNG files in a directory
//! - Memory: frames kept in process
//! - Video file: MPEG-4 via FFmpeg (feature: video-ffmpeg)

use anyhow::Result;
use std::path::Path;

use crate::error::PipelineError;
use crate::frame::Frame;

#[cfg(feature = "video-ffmpeg")]
mod encoder;
mod sequence;

#[cfg(feature = "video-ffmpeg")]
pub use encoder::FfmpegVideoSink;
pub use sequence::{ImageSequenceSink, MemorySink};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov"];

/// Ordered frame consumer.
pub trait VideoSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush buffered output. Further writes are an error.
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;
}

impl<T: VideoSink + ?Sized> VideoSink for Box<T> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn frames_written(&self) -> u64 {
        (**self).frames_written()
    }
}

/// Open the sink named by `locator`.
///
/// A path without extension (or ending in `/`) is an image-sequence directory;
/// `.mp4`, `.avi`, `.mkv` and `.mov` are encoded with FFmpeg.
pub fn open_sink(
    locator: &Path,
    fps: f64,
    width: u32,
    height: u32,
) -> crate::Result<Box<dyn VideoSink>> {
    let as_dir = locator.to_string_lossy().ends_with('/') || locator.extension().is_none();
    if as_dir {
        let sink = ImageSequenceSink::create(locator, width, height)
            .map_err(|e| PipelineError::stream_io(format!("{e:#}")))?;
        return Ok(Box::new(sink));
    }
    let ext = locator
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(PipelineError::stream_io(format!(
            "unsupported video sink {}",
            locator.display()
        )));
    }
    open_video_file(locator, fps, width, height)
}

#[cfg(feature = "video-ffmpeg")]
fn open_video_file(
    locator: &Path,
    fps: f64,
    width: u32,
    height: u32,
) -> crate::Result<Box<dyn VideoSink>> {
    let sink = FfmpegVideoSink::create(locator, fps, width, height).map_err(|e| {
        PipelineError::stream_io(format!("cannot create {}: {e:#}", locator.display()))
    })?;
    Ok(Box::new(sink))
}

#[cfg(not(feature = "video-ffmpeg"))]
fn open_video_file(
    locator: &Path,
    _fps: f64,
    _width: u32,
    _height: u32,
) -> crate::Result<Box<dyn VideoSink>> {
    Err(PipelineError::stream_io(format!(
        "writing {} requires the video-ffmpeg feature",
        locator.display()
    )))
}
