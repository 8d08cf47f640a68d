use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use super::VideoSink;
use crate::frame::Frame;

fn check_size(expected: (u32, u32), frame: &Frame) -> Result<()> {
    let actual = (frame.width(), frame.height());
    if actual != expected {
        return Err(anyhow!(
            "frame is {}x{}, sink was opened for {}x{}",
            actual.0,
            actual.1,
            expected.0,
            expected.1
        ));
    }
    Ok(())
}

/// Writes each frame as `frame_NNNNNN.png` in a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    size: (u32, u32),
    written: u64,
    finished: bool,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path, width: u32, height: u32) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create frame directory {}", dir.display()))?;
        log::info!("ImageSequenceSink: writing frames to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            size: (width, height),
            written: 0,
            finished: false,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl VideoSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("image sequence sink is already finished"));
        }
        check_size(self.size, frame)?;
        let path = self.frame_path(self.written);
        frame
            .image()
            .save(&path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            self.finished = true;
            log::info!(
                "ImageSequenceSink: {} frames in {}",
                self.written,
                self.dir.display()
            );
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

/// Keeps written frames in memory.
#[derive(Default)]
pub struct MemorySink {
    size: Option<(u32, u32)>,
    frames: Vec<RgbImage>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every frame to be `width` x `height`.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            size: Some((width, height)),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl VideoSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("memory sink is already finished"));
        }
        if let Some(size) = self.size {
            check_size(size, frame)?;
        }
        self.frames.push(frame.image().clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_frames_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = ImageSequenceSink::create(&dir.path().join("out"), 4, 2)?;
        sink.write_frame(&Frame::filled(4, 2, [255, 0, 0]))?;
        sink.write_frame(&Frame::filled(4, 2, [0, 255, 0]))?;
        sink.finish()?;

        assert_eq!(sink.frames_written(), 2);
        let second = image::open(sink.frame_path(1))?.to_rgb8();
        assert_eq!(second.get_pixel(0, 0).0, [0, 255, 0]);
        Ok(())
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut sink = MemorySink::with_size(4, 4);
        assert!(sink.write_frame(&Frame::filled(2, 2, [0, 0, 0])).is_err());
        assert_eq!(sink.frames_written(), 0);
    }

    #[test]
    fn writes_after_finish_fail() {
        let mut sink = MemorySink::new();
        sink.finish().unwrap();
        assert!(sink.write_frame(&Frame::filled(1, 1, [0, 0, 0])).is_err());
    }
}
