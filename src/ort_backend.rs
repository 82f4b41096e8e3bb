// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, TensorRTExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;

/// Ultralytics 导出的类别表: {0: 'person', 1: 'bicycle', ...}
static NAMES_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#));

/// 推理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    /// 模型输入为动态尺寸时使用
    pub image_size: u32,
}

/// ONNX Runtime 会话 + 输入输出信息
#[derive(Debug)]
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    input_name: String,
    output_name: String,
    height: u32,
    width: u32,
    output_dims: Vec<i64>,
    names: Option<Vec<String>>,
}

impl OrtBackend {
    pub fn build(args: OrtConfig) -> Result<Self> {
        let mut builder = Session::builder()?;
        let ep = match args.ep {
            OrtEP::Trt(id) => Self::build_trt(&mut builder, id).unwrap_or_else(|e| {
                log::warn!("⚠️ {e}, 使用 CPU");
                OrtEP::CPU
            }),
            OrtEP::CUDA(id) => Self::build_cuda(&mut builder, id).unwrap_or_else(|e| {
                log::warn!("⚠️ {e}, 使用 CPU");
                OrtEP::CPU
            }),
            OrtEP::CPU => OrtEP::CPU,
        };
        if ep == OrtEP::CPU {
            CPUExecutionProvider::default().register(&mut builder)?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&args.f)?;

        // 输入: [1, 3, H, W], 动态维度为 -1
        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow!("model has no inputs"))?;
        let input_name = input.name.clone();
        let dims = input
            .input_type
            .tensor_dimensions()
            .cloned()
            .unwrap_or_default();
        let height = dims
            .get(2)
            .filter(|d| **d > 0)
            .map_or(args.image_size, |d| *d as u32);
        let width = dims
            .get(3)
            .filter(|d| **d > 0)
            .map_or(args.image_size, |d| *d as u32);

        let output = session
            .outputs
            .first()
            .ok_or_else(|| anyhow!("model has no outputs"))?;
        let output_name = output.name.clone();
        let output_dims = output
            .output_type
            .tensor_dimensions()
            .cloned()
            .unwrap_or_default();

        let names = session
            .metadata()
            .ok()
            .and_then(|m| m.custom("names").ok().flatten())
            .map(|s| parse_names(&s))
            .filter(|v| !v.is_empty());

        Ok(Self {
            session,
            ep,
            input_name,
            output_name,
            height,
            width,
            output_dims,
            names,
        })
    }

    fn build_trt(builder: &mut SessionBuilder, device_id: i32) -> Result<OrtEP> {
        let ep = TensorRTExecutionProvider::default()
            .with_device_id(device_id)
            .with_engine_cache(true)
            .with_engine_cache_path("trt-cache");
        if !ep.is_available()? {
            bail!("TensorRT execution provider not available");
        }
        ep.register(builder)?;
        log::info!("🐢 TensorRT 首次序列化模型可能需要一些时间...");
        Ok(OrtEP::Trt(device_id))
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: i32) -> Result<OrtEP> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id);
        if !ep.is_available()? {
            bail!("CUDA execution provider not available");
        }
        ep.register(builder)?;
        Ok(OrtEP::CUDA(device_id))
    }

    /// 执行推理, 返回第一个输出
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
        let tensor = Tensor::from_array(xs)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor]?)?;
        let y = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| anyhow!("missing output {}", self.output_name))?;
        Ok(y.try_extract_tensor::<f32>()?.into_owned())
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn output_dims(&self) -> &[i64] {
        &self.output_dims
    }

    pub fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }
}

/// 解析 metadata 中的类别名, 按编号排序
pub fn parse_names(raw: &str) -> Vec<String> {
    let Ok(re) = NAMES_PATTERN.as_ref() else {
        return Vec::new();
    };
    let mut pairs: Vec<(usize, String)> = re
        .captures_iter(raw)
        .filter_map(|c| Some((c[1].parse().ok()?, c[2].to_string())))
        .collect();
    pairs.sort_by_key(|(id, _)| *id);
    pairs.into_iter().map(|(_, name)| name).collect()
}
