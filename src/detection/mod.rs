/// 检测系统 (Detection System)
///
/// - types:    检测框数据结构
/// - annotate: 按置信度着色的边框与标签绘制
pub mod annotate;
pub mod types;

pub use annotate::{confidence_color, draw_detections, install_font};
pub use types::{Detection, INF_SIZE};
