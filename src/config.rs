//! 配置 - 命令行参数 + JSON 配置文件

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::detection::INF_SIZE;

/// YOLO Studio 参数
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "YOLO 目标检测桌面工作台", long_about = None)]
pub struct Args {
    /// 配置文件路径 (默认: 系统配置目录/yolo-studio/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 启动时预选并加载的 ONNX 模型
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 置信度阈值 (0.10 - 1.00)
    #[arg(long)]
    pub conf: Option<f32>,

    /// 实时检测使用的摄像头编号
    #[arg(long)]
    pub camera: Option<usize>,

    /// 使用 CUDA 推理
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT 推理
    #[arg(long)]
    pub trt: bool,

    /// GPU 编号
    #[arg(long)]
    pub device_id: Option<i32>,
}

/// 推理设备
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
    TensorRt,
}

/// 应用配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // === 检测参数 ===
    pub confidence: f32,    // 置信度阈值
    pub iou_threshold: f32, // NMS IOU阈值
    pub input_size: u32,    // 模型输入尺寸 (模型未声明时使用)

    // === 推理设备 ===
    pub execution_provider: ExecutionProvider,
    pub device_id: i32,

    // === 输入源 ===
    pub camera_index: usize,
    pub decode_queue: usize,      // 解码队列长度
    pub open_timeout_secs: u64,   // 打开输入源超时
    pub live_frame_delay_ms: u64, // 实时检测帧间隔

    // === 输出 ===
    pub output_dir: PathBuf,  // 检测视频保存目录
    pub stats_interval: u64,  // 统计信息刷新间隔(帧)

    // === 界面 ===
    pub font_path: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confidence: 0.50,
            iou_threshold: 0.45,
            input_size: INF_SIZE,
            execution_provider: ExecutionProvider::Cpu,
            device_id: 0,
            camera_index: 0,
            decode_queue: 4,
            open_timeout_secs: 10,
            live_frame_delay_ms: 33,
            output_dir: PathBuf::from("."),
            stats_interval: 30,
            font_path: None,
            model_dir: None,
        }
    }
}

impl AppConfig {
    /// 默认配置文件位置
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("yolo-studio")
            .join("config.json")
    }

    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    log::warn!("⚠️ 保存默认配置失败: {:#}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 命令行参数覆盖配置文件
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(conf) = args.conf {
            self.confidence = conf;
        }
        if let Some(camera) = args.camera {
            self.camera_index = camera;
        }
        if args.trt {
            self.execution_provider = ExecutionProvider::TensorRt;
        } else if args.cuda {
            self.execution_provider = ExecutionProvider::Cuda;
        }
        if let Some(id) = args.device_id {
            self.device_id = id;
        }
        self.confidence = self.confidence.clamp(0.10, 1.0);
    }

    /// 滑块刻度 (10..=100)
    pub fn confidence_slider(&self) -> i32 {
        (self.confidence * 100.0).round() as i32
    }
}
