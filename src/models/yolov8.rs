// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型
// 输出: [1, 4 + nc, anchors], 每列为 cx, cy, w, h, 类别分数...

use anyhow::{bail, Result};
use image::RgbImage;
use ndarray::{s, Array, Axis, IxDyn};

use super::{class_name, letterbox, Model};
use crate::{non_max_suppression, Detection, OrtBackend};

const CXYWH_OFFSET: usize = 4;

pub struct YOLOv8 {
    engine: OrtBackend,
    names: Vec<String>,
    iou: f32,
}

impl YOLOv8 {
    pub fn new(engine: OrtBackend, iou: f32) -> Self {
        let names = engine.names().unwrap_or_default();
        Self { engine, names, iou }
    }
}

impl Model for YOLOv8 {
    fn detect(&mut self, image: &RgbImage, conf: f32) -> Result<Vec<Detection>> {
        let (xs, ratio) = letterbox(image, self.engine.width(), self.engine.height())?;
        let ys = self.engine.run(xs)?;
        let (w0, h0) = image.dimensions();
        decode(&ys, ratio, (w0 as f32, h0 as f32), conf, self.iou, &self.names)
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn summary(&self) -> String {
        format!(
            "YOLOv8 | input {}x{} | {} classes | {:?}",
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

/// 解码原始输出并做 NMS
pub fn decode(
    preds: &Array<f32, IxDyn>,
    ratio: f32,
    (w0, h0): (f32, f32),
    conf: f32,
    iou: f32,
    names: &[String],
) -> Result<Vec<Detection>> {
    if preds.ndim() != 3 || preds.shape()[1] <= CXYWH_OFFSET {
        bail!("unexpected YOLOv8 output shape {:?}", preds.shape());
    }

    let mut data = Vec::new();
    let batch = preds.index_axis(Axis(0), 0);
    for pred in batch.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..]);
        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };
        if confidence < conf {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let det = Detection::new(
            cx - w / 2.,
            cy - h / 2.,
            cx + w / 2.,
            cy + h / 2.,
            confidence,
            id,
            class_name(names, id),
        )
        .clamp_to(w0, h0);
        data.push(det);
    }

    non_max_suppression(&mut data, iou);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 [1, 4+nc, anchors] 输出
    fn output(anchors: &[[f32; 6]]) -> Array<f32, IxDyn> {
        let mut ys = Array::zeros((1, 6, anchors.len())).into_dyn();
        for (a, row) in anchors.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                ys[[0, c, a]] = *v;
            }
        }
        ys
    }

    fn names() -> Vec<String> {
        vec!["person".into(), "car".into()]
    }

    #[test]
    fn boxes_are_mapped_back_by_ratio() {
        let ys = output(&[[100.0, 100.0, 40.0, 20.0, 0.1, 0.9]]);
        let dets = decode(&ys, 0.5, (1000.0, 1000.0), 0.5, 0.45, &names()).unwrap();
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!((d.x1, d.y1, d.x2, d.y2), (160.0, 180.0, 240.0, 220.0));
        assert_eq!(d.class_id, 1);
        assert_eq!(d.label, "car");
    }

    #[test]
    fn low_scores_are_dropped() {
        let ys = output(&[[50.0, 50.0, 10.0, 10.0, 0.3, 0.2]]);
        let dets = decode(&ys, 1.0, (640.0, 640.0), 0.5, 0.45, &names()).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn overlapping_boxes_are_suppressed() {
        let ys = output(&[
            [50.0, 50.0, 40.0, 40.0, 0.9, 0.0],
            [52.0, 50.0, 40.0, 40.0, 0.7, 0.0],
            [300.0, 300.0, 40.0, 40.0, 0.6, 0.0],
        ]);
        let dets = decode(&ys, 1.0, (640.0, 640.0), 0.5, 0.45, &names()).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[1].confidence, 0.6);
    }

    #[test]
    fn boxes_are_clamped_to_image() {
        let ys = output(&[[5.0, 5.0, 40.0, 40.0, 0.9, 0.0]]);
        let dets = decode(&ys, 1.0, (100.0, 100.0), 0.5, 0.45, &names()).unwrap();
        assert_eq!((dets[0].x1, dets[0].y1), (0.0, 0.0));
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let ys = Array::zeros((1, 3)).into_dyn();
        assert!(decode(&ys, 1.0, (1.0, 1.0), 0.5, 0.45, &names()).is_err());
    }
}
