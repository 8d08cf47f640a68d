//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file to RGB24. The decoder is
//! drained once the demuxer runs dry so trailing frames are not lost.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    fps: f64,
    frame_count_hint: Option<u64>,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let fps = if rate.denominator() == 0 {
            0.0
        } else {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        };
        let frame_count_hint = u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0);
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            fps,
            frame_count_hint,
            eof_sent: false,
        })
    }

    pub(crate) fn fps(&self) -> f64 {
        self.fps
    }

    pub(crate) fn frame_size(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    pub(crate) fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count_hint
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut fed = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                fed = true;
                break;
            }
            if !fed {
                self.decoder
                    .send_eof()
                    .context("flush ffmpeg decoder")?;
                self.eof_sent = true;
            }
        }
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        Frame::from_rgb(width, height, pixels)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
