// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv10 模型实现 (NMS-Free端到端检测)
// 特性: 无需NMS后处理, 直接输出最终检测框

use anyhow::{bail, Result};
use image::RgbImage;
use ndarray::{Array, Axis, IxDyn};

use super::{class_name, letterbox, Model};
use crate::{Detection, OrtBackend};

pub struct YOLOv10 {
    engine: OrtBackend,
    names: Vec<String>,
}

impl YOLOv10 {
    pub fn new(engine: OrtBackend) -> Self {
        let names = engine.names().unwrap_or_default();
        Self { engine, names }
    }
}

impl Model for YOLOv10 {
    fn detect(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Detection>> {
        let (xs, ratio) = letterbox(image, self.engine.width(), self.engine.height())?;
        let ys = self.engine.run(xs)?;
        let (w0, h0) = image.dimensions();
        decode(&ys, ratio, (w0 as f32, h0 as f32), conf, &self.names)
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn summary(&self) -> String {
        format!(
            "YOLOv10 (NMS-Free) | input {}x{} | {} classes | {:?}",
            self.engine.width(),
            self.engine.height(),
            self.names.len(),
            self.engine.ep()
        )
    }

    fn input_size(&self) -> (u32, u32) {
        (self.engine.width(), self.engine.height())
    }
}

/// 解码端到端输出
///
/// YOLOv10输出格式: [batch, num_boxes, 6]
/// 其中 6 = [x1, y1, x2, y2, confidence, class_id]
pub fn decode(
    preds: &Array<f32, IxDyn>,
    ratio: f32,
    (w0, h0): (f32, f32),
    conf: f32,
    names: &[String],
) -> Result<Vec<Detection>> {
    if preds.ndim() != 3 || preds.shape()[2] < 6 {
        bail!("unexpected YOLOv10 output shape {:?}", preds.shape());
    }

    let batch = preds.index_axis(Axis(0), 0);
    let ys = batch
        .axis_iter(Axis(0))
        .filter(|row| row[4] >= conf)
        .map(|row| {
            let id = row[5].max(0.0) as usize;
            Detection::new(
                row[0] / ratio,
                row[1] / ratio,
                row[2] / ratio,
                row[3] / ratio,
                row[4],
                id,
                class_name(names, id),
            )
            .clamp_to(w0, h0)
        })
        .collect();
    Ok(ys)
}
