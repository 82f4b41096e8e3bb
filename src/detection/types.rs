/// 检测系统数据结构定义
/// Data structures for the detection system

// ========== 公共常量 ==========

/// YOLO 默认推理输入尺寸
pub const INF_SIZE: u32 = 640;

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box), 坐标为原图像素
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
    pub label: String,
}

impl Detection {
    pub fn new(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        confidence: f32,
        class_id: usize,
        label: impl Into<String>,
    ) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
            label: label.into(),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection_area(&self, another: &Detection) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Detection) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Detection) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }

    /// 标签文本, 例: "person: 0.87"
    pub fn caption(&self) -> String {
        format!("{}: {:.2}", self.label, self.confidence)
    }

    /// 裁剪到图像范围内
    pub fn clamp_to(mut self, width: f32, height: f32) -> Self {
        self.x1 = self.x1.clamp(0.0, width);
        self.y1 = self.y1.clamp(0.0, height);
        self.x2 = self.x2.clamp(0.0, width);
        self.y2 = self.y2.clamp(0.0, height);
        self
    }
}
