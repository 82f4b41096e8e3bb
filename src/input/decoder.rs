/// 视频文件 / 摄像头解码器
/// FFmpeg 帧管线在独立线程中运行, 解码结果经有界队列交给检测线程
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;

use super::decode_filter::{DecodeEvent, DecodeFilter};
use super::{FrameSource, InputSource};
use crate::config::AppConfig;

/// 无法获取帧率时使用
pub const DEFAULT_FPS: f64 = 30.0;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 基于 ez-ffmpeg 的帧源
pub struct FfmpegSource {
    rx: Receiver<DecodeEvent>,
    stop: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    pending: Option<RgbImage>,
    fps: f64,
    live: bool,
}

impl FfmpegSource {
    /// 启动解码线程并等待第一帧
    pub fn open(source: &InputSource, stop: Arc<AtomicBool>, config: &AppConfig) -> Result<Self> {
        let live = source.is_live();
        let (url, format, fps) = match source {
            InputSource::File(path) => {
                if !path.is_file() {
                    bail!("file not found: {}", path.display());
                }
                let fps = probe_fps(path).unwrap_or(DEFAULT_FPS);
                (path.to_string_lossy().into_owned(), None, fps)
            }
            InputSource::Camera(index) => (camera_url(*index), Some(camera_format()), DEFAULT_FPS),
        };

        log::info!("🎬 打开输入源: {} ({:.1} fps)", url, fps);

        let (tx, rx) = bounded(config.decode_queue.max(1));
        let cancel = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx.clone(), stop.clone(), cancel.clone(), live);

        thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || {
                let event = match run_pipeline(&url, format, filter) {
                    Ok(()) => DecodeEvent::End,
                    Err(e) => DecodeEvent::Failed(format!("{e:#}")),
                };
                log::info!("📹 解码循环结束: {}", url);
                let _ = tx.send(event);
            })
            .context("failed to spawn decoder thread")?;

        let timeout = Duration::from_secs(config.open_timeout_secs.max(1));
        let first = match rx.recv_timeout(timeout) {
            Ok(DecodeEvent::Frame(image)) => image,
            Ok(DecodeEvent::Failed(e)) => bail!(e),
            Ok(DecodeEvent::End) => bail!("no video frames decoded"),
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                bail!("timed out after {}s", timeout.as_secs())
            }
            Err(RecvTimeoutError::Disconnected) => bail!("decoder exited"),
        };

        Ok(Self {
            rx,
            stop,
            cancel,
            pending: Some(first),
            fps,
            live,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if let Some(image) = self.pending.take() {
            return Ok(Some(image));
        }
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(DecodeEvent::Frame(image)) => return Ok(Some(image)),
                Ok(DecodeEvent::End) | Err(RecvTimeoutError::Disconnected) => return Ok(None),
                Ok(DecodeEvent::Failed(e)) => return Err(anyhow!(e)),
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // 解码线程在下一帧时退出
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn run_pipeline(url: &str, format: Option<&str>, filter: DecodeFilter) -> Result<()> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let mut input = Input::new(url);
    if let Some(format) = format {
        input = input
            .set_format(format)
            .set_input_opts([("framerate", "30")].into());
    }

    let ctx = FfmpegContext::builder()
        .input(input)
        .filter_descs(["format=yuv420p"].into())
        .output(out)
        .build()
        .map_err(|e| anyhow!("构建失败: {}", e))?;
    let sch = ctx.start().map_err(|e| anyhow!("启动失败: {}", e))?;
    sch.wait().map_err(|e| anyhow!("{}", e))?;
    Ok(())
}

/// 摄像头输入格式 - 根据平台选择
pub fn camera_format() -> &'static str {
    if cfg!(target_os = "windows") {
        "dshow" // DirectShow
    } else if cfg!(target_os = "macos") {
        "avfoundation" // AVFoundation
    } else {
        "v4l2" // Video4Linux2
    }
}

/// 摄像头 URL (DirectShow 需要设备名)
pub fn camera_url(index: usize) -> String {
    if cfg!(target_os = "windows") {
        let name = ez_ffmpeg::device::get_input_video_devices()
            .ok()
            .and_then(|devices| devices.into_iter().nth(index));
        match name {
            Some(name) => format!("video={}", name),
            None => format!("video={}", index),
        }
    } else if cfg!(target_os = "macos") {
        index.to_string()
    } else {
        format!("/dev/video{}", index)
    }
}

/// 读取视频文件的平均帧率
pub fn probe_fps(path: &Path) -> Option<f64> {
    ffmpeg_next::init().ok()?;
    let ictx = ffmpeg_next::format::input(&path).ok()?;
    let stream = ictx.streams().best(ffmpeg_next::media::Type::Video)?;
    let rate = stream.avg_frame_rate();
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    } else {
        None
    }
}

#[cfg(test)]
fn channel_source(
    rx: Receiver<DecodeEvent>,
    stop: Arc<AtomicBool>,
    live: bool,
) -> FfmpegSource {
    FfmpegSource {
        rx,
        stop,
        cancel: Arc::new(AtomicBool::new(false)),
        pending: None,
        fps: DEFAULT_FPS,
        live,
    }
}
