//! 主窗口状态与用户操作
//!
//! 所有按钮/滑块回调都落在 `DetectionApp` 上, 界面层只负责显示与转发.
//! 失败与提示以 `Notice` 形式排队, 由界面弹窗显示.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::config::AppConfig;
use crate::detection::draw_detections;
use crate::error::AppError;
use crate::input::InputSource;
use crate::models::{load_model, Model, SharedModel};
use crate::output;
use crate::worker::{VideoWorker, WorkerEvent};

/// 模型加载函数 (测试可替换)
pub type ModelLoader = Box<dyn Fn(&Path, &AppConfig) -> Result<Box<dyn Model>, AppError>>;

pub const CONFIDENCE_MIN: i32 = 10;
pub const CONFIDENCE_MAX: i32 = 100;
/// 显示纹理的边长上限
pub const MAX_IMAGE_SIDE: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// 弹窗消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

impl From<&AppError> for Notice {
    fn from(err: &AppError) -> Self {
        let (level, title) = if err.is_warning() {
            (NoticeLevel::Warning, "Warning")
        } else {
            (NoticeLevel::Error, "Error")
        };
        Self {
            level,
            title: title.to_string(),
            message: err.to_string(),
        }
    }
}

/// 模型状态文字颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ok,
    Error,
}

pub struct DetectionApp {
    config: AppConfig,
    config_path: Option<PathBuf>,
    loader: ModelLoader,
    worker: VideoWorker,

    model: Option<SharedModel>,
    model_path: Option<PathBuf>,
    pub model_label: String,
    pub model_status: String,
    pub model_status_level: StatusLevel,

    confidence_value: i32,
    pub confidence_label: String,

    current_image: Option<RgbImage>,
    video_path: Option<PathBuf>,
    pub save_video: bool,
    pub camera_index: usize,

    pub stats: String,
    display: Option<RgbImage>,
    display_generation: u64,
    notices: Vec<Notice>,
}

impl DetectionApp {
    pub fn new(config: AppConfig) -> Self {
        let worker = VideoWorker::new(config.clone());
        Self::with_parts(config, worker, Box::new(load_model))
    }

    /// 自定义检测线程与模型加载 (测试使用)
    pub fn with_parts(config: AppConfig, worker: VideoWorker, loader: ModelLoader) -> Self {
        let confidence_value = config.confidence_slider();
        let camera_index = config.camera_index;
        let mut app = Self {
            config,
            config_path: None,
            loader,
            worker,
            model: None,
            model_path: None,
            model_label: "No model selected".to_string(),
            model_status: "Status: No model loaded".to_string(),
            model_status_level: StatusLevel::Error,
            confidence_value,
            confidence_label: String::new(),
            current_image: None,
            video_path: None,
            save_video: false,
            camera_index,
            stats: "Ready...".to_string(),
            display: None,
            display_generation: 0,
            notices: Vec::new(),
        };
        app.update_confidence(confidence_value);
        app
    }

    /// 退出时把界面设置写回该配置文件
    pub fn set_config_path(&mut self, path: PathBuf) {
        self.config_path = Some(path);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn report(&mut self, err: AppError) {
        if err.is_warning() {
            log::warn!("⚠️ {}", err);
        } else {
            log::error!("❌ {}", err);
        }
        self.notices.push(Notice::from(&err));
    }

    fn set_display(&mut self, image: RgbImage) {
        self.display = Some(image);
        self.display_generation += 1;
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    // ========== 模型 ==========

    pub fn browse_model(&mut self, path: PathBuf) {
        self.model_label = format!("Selected: {}", Self::file_name(&path));
        if let Some(dir) = path.parent() {
            self.config.model_dir = Some(dir.to_path_buf());
        }
        self.model_path = Some(path);
    }

    pub fn load_model(&mut self) {
        let Some(path) = self.model_path.clone() else {
            self.report(AppError::NoModelSelected);
            return;
        };

        match (self.loader)(&path, &self.config) {
            Ok(model) => {
                let model: SharedModel = Arc::new(Mutex::new(model));
                self.worker.set_model(model.clone());
                self.model = Some(model);
                self.model_status = "Status: Model loaded successfully".to_string();
                self.model_status_level = StatusLevel::Ok;
                self.notices
                    .push(Notice::info("Success", "Model loaded successfully!"));
            }
            Err(e) => {
                self.report(e);
                self.model_status = "Status: Failed to load model".to_string();
                self.model_status_level = StatusLevel::Error;
            }
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    // ========== 参数 ==========

    pub fn update_confidence(&mut self, value: i32) {
        let value = value.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);
        self.confidence_value = value;
        let confidence = self.confidence();
        self.confidence_label = format!("{:.2}", confidence);
        self.config.confidence = confidence;
        self.worker.set_confidence(confidence);
    }

    pub fn confidence_value(&self) -> i32 {
        self.confidence_value
    }

    pub fn confidence(&self) -> f32 {
        self.confidence_value as f32 / 100.0
    }

    // ========== 图片检测 ==========

    pub fn select_image(&mut self, path: PathBuf) {
        if let Err(e) = self.try_select_image(&path) {
            self.report(e);
        }
    }

    fn try_select_image(&mut self, path: &Path) -> Result<(), AppError> {
        if self.model.is_none() {
            return Err(AppError::NoModelLoaded);
        }
        let image = output::load_image(path).map_err(|e| AppError::ImageLoad(format!("{e:#}")))?;
        let (w, h) = image.dimensions();
        if w > MAX_IMAGE_SIDE || h > MAX_IMAGE_SIDE {
            return Err(AppError::ImageLoad(format!(
                "image too large: {w}x{h} (max {MAX_IMAGE_SIDE})"
            )));
        }
        self.current_image = Some(image.clone());
        self.set_display(image);
        self.stats = format!("Image loaded: {}", Self::file_name(path));
        Ok(())
    }

    pub fn detect_image(&mut self) {
        if let Err(e) = self.try_detect_image() {
            self.report(e);
        }
    }

    fn try_detect_image(&mut self) -> Result<(), AppError> {
        let model = self.model.clone().ok_or(AppError::NoModelLoaded)?;
        let image = self.current_image.as_ref().ok_or(AppError::NoImageSelected)?;

        let detections = {
            let mut model = model
                .lock()
                .map_err(|_| AppError::Detection("model lock poisoned".to_string()))?;
            model
                .detect(image, self.confidence())
                .map_err(|e| AppError::Detection(format!("{e:#}")))?
        };

        let mut annotated = image.clone();
        let n = draw_detections(&mut annotated, &detections);
        self.current_image = Some(annotated.clone());
        self.set_display(annotated);
        self.stats = format!("Detection complete: {} objects found", n);
        self.notices
            .push(Notice::info("Detection Complete", format!("Found {} objects", n)));
        Ok(())
    }

    pub fn save_image(&mut self, path: PathBuf) {
        match self.try_save_image(&path) {
            Ok(()) => self
                .notices
                .push(Notice::info("Success", "Image saved successfully!")),
            Err(e) => self.report(e),
        }
    }

    fn try_save_image(&self, path: &Path) -> Result<(), AppError> {
        let image = self.current_image.as_ref().ok_or(AppError::NothingToSave)?;
        output::save_image(path, image).map_err(|e| AppError::ImageSave(format!("{e:#}")))?;
        Ok(())
    }

    pub fn has_image(&self) -> bool {
        self.current_image.is_some()
    }

    // ========== 视频 / 实时检测 ==========

    pub fn select_video(&mut self, path: PathBuf) {
        if self.model.is_none() {
            self.report(AppError::NoModelLoaded);
            return;
        }
        self.stats = format!("Video selected: {}", Self::file_name(&path));
        self.video_path = Some(path);
    }

    pub fn start_video_detection(&mut self) {
        if let Err(e) = self.try_start_video() {
            self.report(e);
        }
    }

    fn try_start_video(&mut self) -> Result<(), AppError> {
        let path = self.video_path.clone().ok_or(AppError::NoVideoSelected)?;
        if self.worker.is_running() {
            return Err(AppError::AlreadyRunning);
        }
        self.worker.set_source(InputSource::File(path), true);
        self.worker.start()?;
        self.stats = "Processing video... Please wait.".to_string();
        Ok(())
    }

    pub fn start_live_detection(&mut self) {
        if let Err(e) = self.try_start_live() {
            self.report(e);
        }
    }

    fn try_start_live(&mut self) -> Result<(), AppError> {
        if self.model.is_none() {
            return Err(AppError::NoModelLoaded);
        }
        if self.worker.is_running() {
            return Err(AppError::AlreadyRunning);
        }
        self.worker
            .set_source(InputSource::Camera(self.camera_index), self.save_video);
        self.worker.start()?;
        self.stats = "Live detection started...".to_string();
        Ok(())
    }

    pub fn stop_detection(&mut self) {
        if self.worker.is_running() {
            self.worker.stop();
            self.stats = "Detection stopped".to_string();
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// 每帧调用: 取最新标注帧与统计信息
    pub fn poll_worker(&mut self) {
        let mut latest = None;
        while let Some(frame) = self.worker.try_recv_frame() {
            latest = Some(frame);
        }
        if let Some(frame) = latest {
            self.set_display(frame);
        }

        while let Some(event) = self.worker.try_recv_event() {
            match event {
                WorkerEvent::Stats(text) => self.stats = text,
                WorkerEvent::Finished => self.stats = "Detection finished".to_string(),
            }
        }
    }

    /// 窗口关闭
    pub fn shutdown(&mut self) {
        self.worker.stop();
        self.config.camera_index = self.camera_index;
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save(path) {
                log::warn!("⚠️ 保存配置失败: {:#}", e);
            }
        }
        log::info!("👋 程序退出");
    }

    // ========== 界面读取 ==========

    pub fn display(&self) -> Option<&RgbImage> {
        self.display.as_ref()
    }

    /// 显示图像每次更新加一
    pub fn display_generation(&self) -> u64 {
        self.display_generation
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }
}
