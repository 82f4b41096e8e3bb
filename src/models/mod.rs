/// 模型统一接口与实现
///
/// # 架构说明
///
/// - **YOLOv8**: 输出 `[1, 4 + nc, anchors]`, 需要 NMS
///   (YOLOv5u / YOLO11 导出格式相同)
///   - 文件: `yolov8.rs`
/// - **YOLOv10**: 端到端输出 `[1, N, 6]`, 无需 NMS
///   - 文件: `yolov10.rs`
///
/// 两者共享 `OrtBackend` 推理引擎与 letterbox 预处理.
///
/// ## 核心流程
/// ```text
/// 原始图片 → letterbox → NCHW 张量 → OrtBackend::run → 解码 → Vec<Detection>
/// ```
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{Array, IxDyn};

use crate::config::{AppConfig, ExecutionProvider};
use crate::error::AppError;
use crate::{Detection, OrtBackend, OrtConfig, OrtEP};

pub mod yolov10; // YOLOv10 端到端模型 (NMS-Free)
pub mod yolov8; // YOLOv8 / YOLOv5u / YOLO11

pub use yolov10::YOLOv10;
pub use yolov8::YOLOv8;

/// letterbox 填充值
pub const PAD_VALUE: f32 = 144.0 / 255.0;

/// 模型类型 (决定输出解码方式)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// YOLOv8 系列: [1, 4+nc, anchors] + NMS
    YOLOv8,
    /// YOLOv10 端到端模型: [1, N, 6]
    YOLOv10,
}

impl ModelType {
    /// 从文件名推断, 无法判断时返回 None
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.contains("yolov10") || name.contains("v10") {
            Some(ModelType::YOLOv10)
        } else if ["yolov8", "yolov5", "yolo11", "yolov11", "v8", "v5", "v11"]
            .iter()
            .any(|k| name.contains(k))
        {
            Some(ModelType::YOLOv8)
        } else {
            None
        }
    }

    /// 根据输出形状判断: [1, N, 6] 为端到端输出
    pub fn from_output_dims(dims: &[i64]) -> Self {
        match dims {
            [_, n, 6] if *n != 6 => ModelType::YOLOv10,
            _ => ModelType::YOLOv8,
        }
    }
}

/// 统一的检测模型接口
pub trait Model: Send {
    /// 检测一帧, 返回原图坐标下置信度 >= conf 的目标
    fn detect(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Detection>>;

    /// 类别名
    fn names(&self) -> &[String];

    /// 模型信息
    fn summary(&self) -> String;

    /// 输入尺寸 (宽, 高)
    fn input_size(&self) -> (u32, u32);
}

/// UI 线程与检测线程共享的模型
pub type SharedModel = Arc<Mutex<Box<dyn Model>>>;

/// 按配置加载 ONNX 模型
pub fn load_model(path: &Path, config: &AppConfig) -> Result<Box<dyn Model>, AppError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "onnx" => {}
        "pt" => {
            return Err(AppError::ModelLoad(
                "PyTorch .pt weights are not supported, export the model to ONNX first \
                 (yolo export model=<file>.pt format=onnx)"
                    .to_string(),
            ))
        }
        _ => {
            return Err(AppError::ModelLoad(format!(
                "unsupported model file: {}",
                path.display()
            )))
        }
    }

    let ep = match config.execution_provider {
        ExecutionProvider::Cpu => OrtEP::CPU,
        ExecutionProvider::Cuda => OrtEP::CUDA(config.device_id),
        ExecutionProvider::TensorRt => OrtEP::Trt(config.device_id),
    };
    let engine = OrtBackend::build(OrtConfig {
        f: path.to_path_buf(),
        ep,
        image_size: config.input_size,
    })
    .map_err(|e| AppError::ModelLoad(format!("{e:#}")))?;

    let model_type = ModelType::from_path(path)
        .unwrap_or_else(|| ModelType::from_output_dims(engine.output_dims()));
    let model: Box<dyn Model> = match model_type {
        ModelType::YOLOv8 => Box::new(YOLOv8::new(engine, config.iou_threshold)),
        ModelType::YOLOv10 => Box::new(YOLOv10::new(engine)),
    };
    log::info!("✅ 模型加载成功: {}", model.summary());
    Ok(model)
}

/// 缩放比例与缩放后尺寸
pub fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// letterbox: 保持宽高比缩放到左上角, 其余填充 144/255, 输出 [1, 3, H, W]
pub fn letterbox(image: &RgbImage, width: u32, height: u32) -> Result<(Array<f32, IxDyn>, f32)> {
    let (w0, h0) = image.dimensions();
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
    let w_new = (w_new as u32).clamp(1, width);
    let h_new = (h_new as u32).clamp(1, height);

    let src = fr::images::Image::from_vec_u8(w0, h0, image.as_raw().clone(), fr::PixelType::U8x3)?;
    let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src,
        &mut dst,
        &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;

    let mut ys = Array::from_elem((1, 3, height as usize, width as usize), PAD_VALUE).into_dyn();
    for (i, rgb) in dst.buffer().chunks_exact(3).enumerate() {
        let x = i % w_new as usize;
        let y = i / w_new as usize;
        ys[[0, 0, y, x]] = rgb[0] as f32 / 255.0;
        ys[[0, 1, y, x]] = rgb[1] as f32 / 255.0;
        ys[[0, 2, y, x]] = rgb[2] as f32 / 255.0;
    }

    Ok((ys, ratio))
}

/// 类别编号 → 名称
pub(crate) fn class_name(names: &[String], id: usize) -> String {
    names
        .get(id)
        .cloned()
        .unwrap_or_else(|| format!("class_{id}"))
}
