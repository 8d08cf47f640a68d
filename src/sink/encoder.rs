//! MPEG-4 video file sink using FFmpeg.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

use super::VideoSink;
use crate::frame::Frame;

use ffmpeg::util::format::pixel::Pixel;

pub struct FfmpegVideoSink {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    written: u64,
    finished: bool,
}

impl FfmpegVideoSink {
    pub fn create(path: &Path, fps: f64, width: u32, height: u32) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to open {} for writing", path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("MPEG-4 encoder is not available"))?;
        let frame_rate = ffmpeg::Rational::from(fps);
        let time_base = frame_rate.invert();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(frame_rate));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder.open_as(codec).context("open MPEG-4 encoder")?;

        let stream_index = {
            let mut stream = output.add_stream(codec).context("add video stream")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            stream.index()
        };
        output.write_header().context("write container header")?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or(time_base);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FfmpegVideoSink: writing {} ({}x{} @ {:.3} fps)",
            path.display(),
            width,
            height,
            fps
        );
        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            width,
            height,
            written: 0,
            finished: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write video packet")?;
        }
        Ok(())
    }
}

impl VideoSink for FfmpegVideoSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("video sink is already finished"));
        }
        if (frame.width(), frame.height()) != (self.width, self.height) {
            return Err(anyhow!(
                "frame is {}x{}, video is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, self.width, self.height);
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let pixels = frame.pixels();
        {
            let data = rgb.data_mut(0);
            for row in 0..self.height as usize {
                data[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&pixels[row * row_bytes..(row + 1) * row_bytes]);
            }
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.written as i64));
        self.encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        self.drain_packets()?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .context("write container trailer")?;
        log::info!("FfmpegVideoSink: {} frames encoded", self.written);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}
