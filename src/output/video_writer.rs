// 视频输出 - RGB 帧编码为 H.264 (不可用时回退 MPEG-4)

use std::path::Path;

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{output, Pixel};
use ffmpeg_next::software::scaling::{context::Context as ScalingContext, flag::Flags};
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{codec, Rational};
use image::RgbImage;

use super::FrameWriter;

/// ffmpeg-next 视频写入器
pub struct VideoWriter {
    output_context: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    /// RGB24 -> YUV420P
    scaler: ScalingContext,
    width: u32,
    height: u32,
    frame_rate: Rational,
    frame_index: i64,
    stream_index: usize,
    time_base: Rational,
    finished: bool,
}

impl VideoWriter {
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        ffmpeg::init().context("无法初始化 FFmpeg")?;

        let mut output_context =
            output(&path).with_context(|| format!("无法创建输出文件: {}", path.display()))?;

        let codec = ffmpeg::encoder::find(codec::Id::H264)
            .or_else(|| ffmpeg::encoder::find(codec::Id::MPEG4))
            .context("找不到视频编码器")?;
        let global_header = output_context
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let mut stream = output_context.add_stream(codec)?;
        let stream_index = stream.index();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        // YUV420P 需要偶数尺寸
        let enc_width = (width & !1).max(2);
        let enc_height = (height & !1).max(2);
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        let frame_rate = Rational::from(fps);

        encoder.set_width(enc_width);
        encoder.set_height(enc_height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_time_base(frame_rate.invert());
        if global_header {
            encoder.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open()?;
        stream.set_parameters(&encoder);
        output_context.write_header()?;
        let time_base = output_context
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or_else(|| frame_rate.invert());

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            enc_width,
            enc_height,
            Flags::BILINEAR,
        )?;

        log::info!(
            "🎞️ 视频输出: {} ({}x{} @ {:.2} fps, {:?})",
            path.display(),
            enc_width,
            enc_height,
            fps,
            codec.id()
        );

        Ok(Self {
            output_context,
            encoder,
            scaler,
            width,
            height,
            frame_rate,
            frame_index: 0,
            stream_index,
            time_base,
            finished: false,
        })
    }

    /// 编码并写入帧, None 表示刷新编码器
    fn encode_frame(&mut self, frame: Option<&Video>) -> Result<()> {
        if let Some(f) = frame {
            self.encoder.send_frame(f)?;
        } else {
            self.encoder.send_eof()?;
        }

        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.frame_rate.invert(), self.time_base);
            packet.write_interleaved(&mut self.output_context)?;
        }

        Ok(())
    }
}

impl FrameWriter for VideoWriter {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if image.dimensions() != (self.width, self.height) {
            anyhow::bail!(
                "frame size {:?} does not match video size {}x{}",
                image.dimensions(),
                self.width,
                self.height
            );
        }

        let mut rgb_frame = Video::new(Pixel::RGB24, self.width, self.height);
        let data = image.as_raw();
        let stride = rgb_frame.stride(0);
        let row = self.width as usize * 3;

        // 复制数据，处理步长对齐
        let frame_data = rgb_frame.data_mut(0);
        for y in 0..self.height as usize {
            frame_data[y * stride..y * stride + row].copy_from_slice(&data[y * row..(y + 1) * row]);
        }

        let mut yuv_frame = Video::empty();
        self.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.encode_frame(Some(&yuv_frame))
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encode_frame(None)?;
        self.output_context.write_trailer()?;
        log::info!("💾 视频写入完成: {} 帧", self.frame_index);
        Ok(())
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("⚠️ 视频收尾失败: {:#}", e);
        }
    }
}
