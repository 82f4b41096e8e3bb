// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
#![allow(clippy::type_complexity)]

pub mod app; // 主窗口状态与操作
pub mod config; // 命令行与JSON配置
pub mod detection; // 检测结果与标注
pub mod error; // 面向用户的错误类型
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod ort_backend; // ONNX Runtime 推理引擎
pub mod output; // 结果保存 (图片/视频)
pub mod renderer; // macroquad + egui 界面
pub mod worker; // 后台视频检测线程

pub use crate::app::{DetectionApp, Notice, NoticeLevel};
pub use crate::config::{AppConfig, Args};
pub use crate::detection::{draw_detections, Detection};
pub use crate::error::AppError;
pub use crate::models::{load_model, Model, ModelType, SharedModel};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use crate::worker::{VideoWorker, WorkerEvent};

/// 类别无关的非极大值抑制, 按置信度降序保留
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 本地时间字符串, 用于输出文件命名 (例: 20240131_235959)
pub fn gen_time_string() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Detection {
        Detection::new(x1, y1, x2, y2, confidence, 0, "person")
    }

    #[test]
    fn nms_keeps_highest_of_overlapping_boxes() {
        let mut xs = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.6),
            det(2.0, 2.0, 102.0, 102.0, 0.9),
            det(300.0, 300.0, 350.0, 350.0, 0.4),
        ];
        non_max_suppression(&mut xs, 0.45);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].confidence, 0.9);
        assert_eq!(xs[1].confidence, 0.4);
    }

    #[test]
    fn nms_on_empty_input_is_noop() {
        let mut xs = Vec::new();
        non_max_suppression(&mut xs, 0.45);
        assert!(xs.is_empty());
    }

    #[test]
    fn time_string_is_filename_safe() {
        let s = gen_time_string();
        assert_eq!(s.len(), 15);
        assert_eq!(&s[8..9], "_");
        assert!(s.chars().all(|c| c.is_ascii_digit() || c == '_'));
    }
}
