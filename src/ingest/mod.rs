//! Frame sources.
//!
//! A source yields decoded frames strictly in stream order and reports end of
//! stream with `Ok(None)`. Handles are released on drop, so a run that bails
//! out early still closes its input.
//!
//! - `stub://` locators: deterministic synthetic frames (tests, dry runs)
//! - Local video files (feature: video-ffmpeg)

use anyhow::Result;

use crate::frame::Frame;

pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{open_source, FileConfig, FileSource};

/// Ordered, finite sequence of frames with a fixed rate.
pub trait FrameSource {
    /// Nominal frames per second of the stream.
    fn fps(&self) -> f64;

    /// Frame width and height in pixels.
    fn frame_size(&self) -> (u32, u32);

    /// Total frame count if the container reports one. Used for progress only.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    /// Next frame in order, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_size(&self) -> (u32, u32) {
        (**self).frame_size()
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}
