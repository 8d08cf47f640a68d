//! Owned frame buffer.
//!
//! A `Frame` is one decoded picture in packed RGB24. Sources create it, the
//! oracle reads it, the overlay renderer may draw on it, and a sink consumes
//! it. Nothing holds on to a frame past the iteration that produced it.

use anyhow::{anyhow, Result};
use image::RgbImage;

pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap packed RGB24 bytes. The length must be exactly `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", width, height))?;
        Ok(Self { image })
    }

    /// Solid-colour frame, handy for tests and synthetic sources.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffers() {
        let err = Frame::from_rgb(4, 4, vec![0; 10]).unwrap_err();
        assert!(err.to_string().contains("expected 48 RGB bytes"));
    }

    #[test]
    fn wraps_exact_buffers() {
        let frame = Frame::from_rgb(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.pixels(), &[1, 2, 3, 4, 5, 6]);
    }
}
