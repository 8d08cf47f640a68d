//! File frame source.
//!
//! `FileSource` reads a recorded stream from a local path. `stub://` locators
//! select a synthetic stream whose length, rate and size are given as query
//! parameters, e.g. `stub://clip?frames=90&fps=30&width=320&height=240`.

use anyhow::{anyhow, Result};
use std::path::Path;

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
use crate::error::PipelineError;
use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";
const DEFAULT_STUB_FRAMES: u64 = 30;
const DEFAULT_STUB_FPS: f64 = 10.0;
const DEFAULT_STUB_WIDTH: u32 = 64;
const DEFAULT_STUB_HEIGHT: u32 = 48;
const MAX_STUB_DIMENSION: u32 = 8192;

/// Configuration for a file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path or `stub://` locator.
    pub path: String,
}

/// File frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.path.trim().is_empty() {
            return Err(anyhow!("input locator is empty"));
        }
        if let Some(target) = config.path.strip_prefix(STUB_SCHEME) {
            let synthetic = SyntheticFileSource::parse(target)?;
            return Ok(Self {
                backend: FileBackend::Synthetic(synthetic),
            });
        }
        if config.path.contains("://") {
            return Err(anyhow!(
                "file ingestion only supports local paths and stub:// locators"
            ));
        }
        if !Path::new(&config.path).is_file() {
            return Err(anyhow!("input file {} does not exist", config.path));
        }
        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
            })
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!("decoding video files requires the video-ffmpeg feature"))
        }
    }
}

impl FrameSource for FileSource {
    fn fps(&self) -> f64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.fps,
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.fps(),
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        match &self.backend {
            FileBackend::Synthetic(source) => (source.width, source.height),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frame_size(),
        }
    }

    fn frame_count_hint(&self) -> Option<u64> {
        match &self.backend {
            FileBackend::Synthetic(source) => Some(source.total_frames),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frame_count_hint(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

/// Open `locator` as a frame source. Any failure here is a configuration error.
pub fn open_source(locator: &str) -> crate::Result<FileSource> {
    let source = FileSource::new(FileConfig {
        path: locator.to_string(),
    })
    .map_err(|e| PipelineError::configuration(format!("cannot open input {locator}: {e:#}")))?;
    let fps = source.fps();
    if !(fps.is_finite() && fps > 0.0) {
        return Err(PipelineError::configuration(format!(
            "input {locator} reports an unusable frame rate ({fps})"
        )));
    }
    let (width, height) = source.frame_size();
    log::info!(
        "FileSource: opened {} ({}x{} @ {:.3} fps)",
        locator,
        width,
        height,
        fps
    );
    Ok(source)
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    total_frames: u64,
    fps: f64,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn parse(target: &str) -> Result<Self> {
        let mut source = Self {
            total_frames: DEFAULT_STUB_FRAMES,
            fps: DEFAULT_STUB_FPS,
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
            frame_count: 0,
        };
        let Some((_, query)) = target.split_once('?') else {
            return Ok(source);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => source.total_frames = parse_param(key, value)?,
                "fps" => source.fps = parse_param(key, value)?,
                "width" => source.width = parse_param(key, value)?,
                "height" => source.height = parse_param(key, value)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        if source.width > MAX_STUB_DIMENSION || source.height > MAX_STUB_DIMENSION {
            return Err(anyhow!(
                "stub frame size {}x{} exceeds {}x{}",
                source.width,
                source.height,
                MAX_STUB_DIMENSION,
                MAX_STUB_DIMENSION
            ));
        }
        Ok(source)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.total_frames {
            return Ok(None);
        }
        let pixels = self.generate_synthetic_pixels();
        self.frame_count += 1;
        Frame::from_rgb(self.width, self.height, pixels).map(Some)
    }

    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = self.width as usize * self.height as usize * 3;
        (0..pixel_count)
            .map(|i| ((i as u64 + self.frame_count) % 256) as u8)
            .collect()
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value '{}' for stub parameter '{}'", value, key))
}
