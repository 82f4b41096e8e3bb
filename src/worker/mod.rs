//! 检测线程 (Video Worker)
//! 职责: 读取帧 → YOLO检测 → 标注 → 发送显示帧/统计信息 → 可选保存视频

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use image::RgbImage;

use crate::config::AppConfig;
use crate::detection::draw_detections;
use crate::error::AppError;
use crate::input::{FfmpegSource, FrameSource, InputSource, DEFAULT_FPS};
use crate::models::SharedModel;
use crate::output::{output_video_path, FrameWriter, VideoWriter};

/// 显示队列长度, UI 跟不上时丢帧
const FRAME_QUEUE: usize = 2;

/// 检测线程 → UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// 统计/状态文本
    Stats(String),
    /// 本次运行结束
    Finished,
}

/// 打开输入源
pub type SourceOpener = Arc<
    dyn Fn(&InputSource, Arc<AtomicBool>, &AppConfig) -> Result<Box<dyn FrameSource>>
        + Send
        + Sync,
>;

/// 创建视频写入器 (路径, 宽, 高, 帧率)
pub type WriterOpener =
    Arc<dyn Fn(&Path, u32, u32, f64) -> Result<Box<dyn FrameWriter>> + Send + Sync>;

fn ffmpeg_source_opener() -> SourceOpener {
    Arc::new(
        |source: &InputSource, stop: Arc<AtomicBool>, config: &AppConfig| -> Result<Box<dyn FrameSource>> {
            let source = FfmpegSource::open(source, stop, config)?;
            Ok(Box::new(source) as Box<dyn FrameSource>)
        },
    )
}

fn ffmpeg_writer_opener() -> WriterOpener {
    Arc::new(
        |path: &Path, width: u32, height: u32, fps: f64| -> Result<Box<dyn FrameWriter>> {
            let writer = VideoWriter::create(path, width, height, fps)?;
            Ok(Box::new(writer) as Box<dyn FrameWriter>)
        },
    )
}

pub struct VideoWorker {
    config: AppConfig,
    model: Option<SharedModel>,
    /// f32 位模式, 运行中可实时调整
    confidence: Arc<AtomicU32>,
    source: Option<InputSource>,
    save: bool,

    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,

    frame_tx: Sender<RgbImage>,
    frame_rx: Receiver<RgbImage>,
    event_tx: Sender<WorkerEvent>,
    event_rx: Receiver<WorkerEvent>,

    open_source: SourceOpener,
    open_writer: WriterOpener,
}

impl VideoWorker {
    pub fn new(config: AppConfig) -> Self {
        Self::with_openers(config, ffmpeg_source_opener(), ffmpeg_writer_opener())
    }

    /// 自定义输入源/写入器 (测试使用内存实现)
    pub fn with_openers(
        config: AppConfig,
        open_source: SourceOpener,
        open_writer: WriterOpener,
    ) -> Self {
        let (frame_tx, frame_rx) = bounded(FRAME_QUEUE);
        let (event_tx, event_rx) = unbounded();
        Self {
            confidence: Arc::new(AtomicU32::new(config.confidence.to_bits())),
            config,
            model: None,
            source: None,
            save: false,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            frame_tx,
            frame_rx,
            event_tx,
            event_rx,
            open_source,
            open_writer,
        }
    }

    pub fn set_model(&mut self, model: SharedModel) {
        self.model = Some(model);
    }

    /// 下一帧生效
    pub fn set_confidence(&self, confidence: f32) {
        self.confidence.store(confidence.to_bits(), Ordering::Relaxed);
    }

    pub fn confidence(&self) -> f32 {
        f32::from_bits(self.confidence.load(Ordering::Relaxed))
    }

    pub fn set_source(&mut self, source: InputSource, save: bool) {
        self.source = Some(source);
        self.save = save;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn start(&mut self) -> Result<(), AppError> {
        if self.is_running() {
            return Err(AppError::AlreadyRunning);
        }
        let model = self.model.clone().ok_or(AppError::NoModelLoaded)?;
        let source = self.source.clone().ok_or(AppError::NoVideoSelected)?;

        // 回收上一次已结束的线程
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        while self.frame_rx.try_recv().is_ok() {}

        self.stop.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);

        let run = Run {
            config: self.config.clone(),
            model,
            confidence: self.confidence.clone(),
            source,
            save: self.save,
            running: self.running.clone(),
            stop: self.stop.clone(),
            frame_tx: self.frame_tx.clone(),
            event_tx: self.event_tx.clone(),
            open_source: self.open_source.clone(),
            open_writer: self.open_writer.clone(),
        };

        match thread::Builder::new()
            .name("detector".to_string())
            .spawn(move || run.run())
        {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(AppError::Detection(e.to_string()))
            }
        }
    }

    /// 请求停止并等待线程退出
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("❌ 检测线程异常退出");
                self.running.store(false, Ordering::Release);
            }
        }
    }

    /// 取一帧标注图像
    pub fn try_recv_frame(&self) -> Option<RgbImage> {
        self.frame_rx.try_recv().ok()
    }

    pub fn try_recv_event(&self) -> Option<WorkerEvent> {
        self.event_rx.try_recv().ok()
    }
}

impl Drop for VideoWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 一次运行的全部状态 (移入检测线程)
struct Run {
    config: AppConfig,
    model: SharedModel,
    confidence: Arc<AtomicU32>,
    source: InputSource,
    save: bool,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    frame_tx: Sender<RgbImage>,
    event_tx: Sender<WorkerEvent>,
    open_source: SourceOpener,
    open_writer: WriterOpener,
}

impl Run {
    fn run(self) {
        log::info!("🔍 检测线程启动: {}", self.source);

        match (self.open_source)(&self.source, self.stop.clone(), &self.config) {
            Ok(source) => self.process(source),
            Err(e) => {
                log::error!("❌ 无法打开输入源 {}: {:#}", self.source, e);
                self.emit("Error: Could not open video source".to_string());
            }
        }

        self.running.store(false, Ordering::Release);
        let _ = self.event_tx.send(WorkerEvent::Finished);
        log::info!("✅ 检测线程退出");
    }

    fn emit(&self, stats: String) {
        let _ = self.event_tx.send(WorkerEvent::Stats(stats));
    }

    fn process(&self, mut source: Box<dyn FrameSource>) {
        let live = source.is_live();
        let fps = if source.fps() > 0.0 { source.fps() } else { DEFAULT_FPS };
        let interval = self.config.stats_interval.max(1);
        let delay = Duration::from_millis(self.config.live_frame_delay_ms);

        let mut writer: Option<Box<dyn FrameWriter>> = None;
        let mut writer_failed = false;
        let mut frame_count: u64 = 0;
        let mut detection_count: u64 = 0;
        let started = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::error!("❌ 读取帧失败: {:#}", e);
                    break;
                }
            };
            frame_count += 1;

            // 按第一帧尺寸创建写入器
            if self.save && writer.is_none() && !writer_failed {
                let path = output_video_path(&self.config.output_dir);
                let (w, h) = frame.dimensions();
                match (self.open_writer)(&path, w, h, fps) {
                    Ok(w) => writer = Some(w),
                    Err(e) => {
                        writer_failed = true;
                        log::error!("❌ 创建输出视频失败: {:#}", e);
                        self.emit(format!("Error: Could not create output video: {e}"));
                    }
                }
            }

            let confidence = f32::from_bits(self.confidence.load(Ordering::Relaxed));
            let detected = match self.model.lock() {
                Ok(mut model) => model.detect(&frame, confidence),
                Err(_) => Err(anyhow::anyhow!("model lock poisoned")),
            };

            match detected {
                Ok(detections) => {
                    detection_count += detections.len() as u64;
                    let mut annotated = frame;
                    draw_detections(&mut annotated, &detections);

                    if let Some(w) = writer.as_mut() {
                        if let Err(e) = w.write_frame(&annotated) {
                            log::warn!("⚠️ 写入视频帧失败: {:#}", e);
                        }
                    }

                    match self.frame_tx.try_send(annotated) {
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Disconnected(_)) => break,
                    }

                    if frame_count % interval == 0 {
                        let elapsed = started.elapsed().as_secs_f64();
                        let measured = if elapsed > 0.0 {
                            frame_count as f64 / elapsed
                        } else {
                            0.0
                        };
                        self.emit(format!(
                            "Frames: {} | Detections: {} | FPS: ~{:.1}",
                            frame_count, detection_count, measured
                        ));
                    }
                }
                Err(e) => {
                    log::warn!("⚠️ 检测失败: {:#}", e);
                    self.emit(format!("Detection error: {e}"));
                }
            }

            if live && !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        drop(source);

        if let Some(mut w) = writer {
            if let Err(e) = w.finish() {
                log::error!("❌ 视频保存失败: {:#}", e);
            }
            self.emit(format!(
                "Video saved! Total frames: {}, Total detections: {}",
                frame_count, detection_count
            ));
        } else if self.save && !writer_failed {
            // 第一帧之前结束, 没有可写的尺寸
            log::warn!("⚠️ 未收到任何帧, 未生成输出视频");
            self.emit(format!(
                "No video saved (no frames received). Total frames: {}, Total detections: {}",
                frame_count, detection_count
            ));
        }
        log::info!(
            "📊 处理完成: {} 帧, {} 个目标",
            frame_count,
            detection_count
        );
    }
}
