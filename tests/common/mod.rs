//! 测试辅助: 假模型, 内存帧源, 记录型写入器
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use yolo_studio::input::{FrameSource, InputSource};
use yolo_studio::models::Model;
use yolo_studio::output::FrameWriter;
use yolo_studio::worker::{SourceOpener, WriterOpener};
use yolo_studio::{AppConfig, Detection, VideoWorker, WorkerEvent};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn frame(shade: u8) -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([shade, shade, shade]))
}

/// 固定返回若干目标, 记录每次调用的置信度
pub struct FakeModel {
    pub detections: Vec<Detection>,
    pub fail: bool,
    pub seen_conf: Arc<Mutex<Vec<f32>>>,
    names: Vec<String>,
}

impl FakeModel {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            fail: false,
            seen_conf: Arc::new(Mutex::new(Vec::new())),
            names: vec!["person".to_string(), "car".to_string()],
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// 两个互不重叠的目标
    pub fn two_boxes() -> Self {
        Self::new(vec![
            Detection::new(4.0, 4.0, 20.0, 20.0, 0.9, 0, "person"),
            Detection::new(30.0, 10.0, 60.0, 40.0, 0.6, 1, "car"),
        ])
    }
}

impl Model for FakeModel {
    fn detect(&mut self, _image: &RgbImage, conf: f32) -> anyhow::Result<Vec<Detection>> {
        if let Ok(mut seen) = self.seen_conf.lock() {
            seen.push(conf);
        }
        if self.fail {
            anyhow::bail!("inference exploded");
        }
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= conf)
            .cloned()
            .collect())
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn summary(&self) -> String {
        "fake model".to_string()
    }

    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }
}

/// 内存帧源; `endless` 时模拟摄像头
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
    endless: bool,
    live: bool,
    stop: Arc<AtomicBool>,
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        if self.stop.load(Ordering::Acquire) {
            return Ok(None);
        }
        if self.endless {
            thread::sleep(Duration::from_millis(2));
            return Ok(Some(frame(128)));
        }
        Ok(self.frames.pop_front())
    }

    fn fps(&self) -> f64 {
        25.0
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// 文件源返回 `count` 帧; 摄像头源一直产生帧直到停止
pub fn memory_opener(count: usize) -> SourceOpener {
    Arc::new(
        move |source: &InputSource,
              stop: Arc<AtomicBool>,
              _config: &AppConfig|
              -> anyhow::Result<Box<dyn FrameSource>> {
            let live = source.is_live();
            let frames = (0..count).map(|i| frame((i * 20) as u8)).collect();
            Ok(Box::new(MemorySource {
                frames,
                endless: live,
                live,
                stop,
            }) as Box<dyn FrameSource>)
        },
    )
}

pub fn failing_opener() -> SourceOpener {
    Arc::new(
        |_source: &InputSource,
         _stop: Arc<AtomicBool>,
         _config: &AppConfig|
         -> anyhow::Result<Box<dyn FrameSource>> { anyhow::bail!("no such device") },
    )
}

#[derive(Debug, Default)]
pub struct Recording {
    pub path: Option<PathBuf>,
    pub size: (u32, u32),
    pub fps: f64,
    pub frames: usize,
    pub finished: bool,
}

pub struct RecordingWriter {
    recording: Arc<Mutex<Recording>>,
}

impl FrameWriter for RecordingWriter {
    fn write_frame(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        let mut rec = self
            .recording
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        anyhow::ensure!(image.dimensions() == rec.size, "size mismatch");
        rec.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        let mut rec = self
            .recording
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        rec.finished = true;
        Ok(())
    }
}

pub fn recording_opener() -> (WriterOpener, Arc<Mutex<Recording>>) {
    let recording = Arc::new(Mutex::new(Recording::default()));
    let shared = recording.clone();
    let opener: WriterOpener = Arc::new(
        move |path: &Path, w: u32, h: u32, fps: f64| -> anyhow::Result<Box<dyn FrameWriter>> {
            if let Ok(mut rec) = shared.lock() {
                rec.path = Some(path.to_path_buf());
                rec.size = (w, h);
                rec.fps = fps;
            }
            Ok(Box::new(RecordingWriter {
                recording: shared.clone(),
            }) as Box<dyn FrameWriter>)
        },
    );
    (opener, recording)
}

pub fn failing_writer() -> WriterOpener {
    Arc::new(
        |_path: &Path, _w: u32, _h: u32, _fps: f64| -> anyhow::Result<Box<dyn FrameWriter>> {
            anyhow::bail!("disk full")
        },
    )
}

/// 测试配置: 每帧输出统计, 输出目录为临时目录, 摄像头不节流
pub fn test_config(output_dir: &Path) -> AppConfig {
    AppConfig {
        output_dir: output_dir.to_path_buf(),
        stats_interval: 1,
        live_frame_delay_ms: 0,
        ..AppConfig::default()
    }
}

/// 收集事件直到 Finished (最多 5 秒), 同时取走显示帧
pub fn wait_finished(worker: &VideoWorker) -> (Vec<String>, usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut stats = Vec::new();
    let mut frames = 0;
    loop {
        while worker.try_recv_frame().is_some() {
            frames += 1;
        }
        match worker.try_recv_event() {
            Some(WorkerEvent::Stats(text)) => stats.push(text),
            Some(WorkerEvent::Finished) => break,
            None => {
                assert!(Instant::now() < deadline, "worker did not finish: {stats:?}");
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
    while worker.try_recv_frame().is_some() {
        frames += 1;
    }
    (stats, frames)
}
