//! Drawing primitives for overlay labels.
//!
//! Boxes are drawn with `imageproc`; label text uses a built-in 5x7 bitmap
//! font (upper-case only) so rendering needs no font files. Everything is
//! clipped to the frame.

use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::frame::Frame;
use crate::overlay::OverlayLabel;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;

/// Blue, as the overlay has always been drawn.
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Renders one overlay label onto a frame.
pub trait Annotator {
    fn annotate(&mut self, frame: &mut Frame, label: &OverlayLabel) -> Result<()>;
}

/// Draws a 1 px box and the label text `text_offset` pixels above its top-left corner.
#[derive(Clone, Debug)]
pub struct FrameAnnotator {
    color: Rgb<u8>,
    text_offset: i32,
}

impl FrameAnnotator {
    pub fn new() -> Self {
        Self {
            color: BOX_COLOR,
            text_offset: 10,
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator for FrameAnnotator {
    fn annotate(&mut self, frame: &mut Frame, label: &OverlayLabel) -> Result<()> {
        let [x1, y1, x2, y2] = label.rect;
        let image = frame.image_mut();
        // corners inclusive; edges clamped to one pixel past the frame stay invisible
        let (w, h) = (image.width() as i32, image.height() as i32);
        let (cx1, cx2) = (x1.clamp(-1, w), x2.clamp(-1, w));
        let (cy1, cy2) = (y1.clamp(-1, h), y2.clamp(-1, h));
        let width = (cx2 - cx1 + 1).max(1) as u32;
        let height = (cy2 - cy1 + 1).max(1) as u32;
        draw_hollow_rect_mut(image, Rect::at(cx1, cy1).of_size(width, height), self.color);
        // text baseline sits text_offset above the box
        let text_y = y1
            .saturating_sub(self.text_offset)
            .saturating_sub(GLYPH_HEIGHT);
        draw_text(image, &label.text, x1, text_y, self.color);
        Ok(())
    }
}

/// Draw `text` with its top-left corner at `(x, y)`.
pub fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    for (i, ch) in text.chars().enumerate() {
        let origin_x = i64::from(x) + i as i64 * i64::from(GLYPH_ADVANCE);
        if origin_x >= w {
            break;
        }
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                let px = origin_x + i64::from(col);
                let py = i64::from(y) + row as i64;
                if px >= 0 && py >= 0 && px < w && py < h {
                    image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        ' ' => [0; 7],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
