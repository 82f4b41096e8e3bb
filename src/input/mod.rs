/// 视频输入系统 (Video Input System)
///
/// 独立解码线程,负责视频文件/摄像头解码
/// - FfmpegSource: 文件与本地摄像头解码器 (DirectShow/AVFoundation/V4L2)
/// - DecodeFilter: 帧过滤与 YUV → RGB 转换
pub mod decode_filter;
pub mod decoder;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;

pub use decode_filter::{DecodeEvent, DecodeFilter};
pub use decoder::{camera_format, camera_url, probe_fps, FfmpegSource, DEFAULT_FPS};

/// 输入源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Camera(usize),
}

impl InputSource {
    /// 摄像头为实时源
    pub fn is_live(&self) -> bool {
        matches!(self, InputSource::Camera(_))
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::File(path) => write!(f, "{}", path.display()),
            InputSource::Camera(index) => write!(f, "camera {}", index),
        }
    }
}

/// 帧源: 逐帧读取 RGB 图像
pub trait FrameSource {
    /// 下一帧; 输入结束或已停止时返回 None
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// 帧率 (用于保存视频)
    fn fps(&self) -> f64;

    /// 是否为实时源
    fn is_live(&self) -> bool;
}

/// 视频设备信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    pub name: String,
    pub index: usize,
}

/// 获取可用的视频设备列表
pub fn get_video_devices() -> Vec<VideoDevice> {
    log::info!("🔍 正在扫描视频设备...");

    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => {
            log::info!("✅ 找到 {} 个视频设备", devices.len());
            devices
                .into_iter()
                .enumerate()
                .map(|(index, name)| VideoDevice { name, index })
                .collect()
        }
        Err(e) => {
            log::warn!("⚠️ 获取设备列表失败: {}", e);
            vec![VideoDevice {
                name: "Default camera".to_string(),
                index: 0,
            }]
        }
    }
}
