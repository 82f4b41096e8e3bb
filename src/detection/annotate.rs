//! 检测结果标注: 边框 + 标签, 颜色按置信度分档

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use once_cell::sync::OnceCell;

use super::Detection;

/// 高置信度 (>= 0.8)
pub const HIGH_CONFIDENCE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// 中置信度 (>= 0.6)
pub const MEDIUM_CONFIDENCE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
/// 低置信度
pub const LOW_CONFIDENCE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_PADDING: i32 = 10;
const LABEL_BASELINE_OFFSET: i32 = 5;
// 无字体时的文本尺寸估算
const FALLBACK_CHAR_WIDTH: u32 = 11;
const FALLBACK_TEXT_HEIGHT: u32 = 14;

/// 常见系统字体位置
static SYSTEM_FONTS: [&str; 8] = [
    "assets/font/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

static LABEL_FONT: OnceCell<Option<FontArc>> = OnceCell::new();

/// 指定标签字体 (仅首次调用生效), 返回是否有可用字体
pub fn install_font(path: Option<&Path>) -> bool {
    let mut loaded_here = false;
    let font = LABEL_FONT.get_or_init(|| {
        loaded_here = true;
        let candidates: Vec<PathBuf> = path
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
            .collect();
        load_first_font(&candidates)
    });
    if let (false, Some(path)) = (loaded_here, path) {
        log::warn!("⚠️ 标签字体已初始化, 忽略 {}", path.display());
    }
    font.is_some()
}

fn load_first_font(candidates: &[PathBuf]) -> Option<FontArc> {
    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                log::info!("✅ 标签字体加载成功: {}", path.display());
                return Some(font);
            }
            Err(e) => log::warn!("⚠️ 字体解析失败 {}: {}", path.display(), e),
        }
    }
    log::warn!("⚠️ 未找到可用字体, 标签将只绘制背景");
    None
}

fn label_font() -> Option<&'static FontArc> {
    LABEL_FONT
        .get_or_init(|| {
            let candidates: Vec<PathBuf> = SYSTEM_FONTS.iter().map(PathBuf::from).collect();
            load_first_font(&candidates)
        })
        .as_ref()
}

/// 按置信度分档取色
pub fn confidence_color(confidence: f32) -> Rgb<u8> {
    if confidence >= 0.8 {
        HIGH_CONFIDENCE_COLOR
    } else if confidence >= 0.6 {
        MEDIUM_CONFIDENCE_COLOR
    } else {
        LOW_CONFIDENCE_COLOR
    }
}

fn caption_size(font: Option<&FontArc>, caption: &str) -> (u32, u32) {
    match font {
        Some(font) => text_size(PxScale::from(LABEL_FONT_SIZE), font, caption),
        None => (
            caption.chars().count() as u32 * FALLBACK_CHAR_WIDTH,
            FALLBACK_TEXT_HEIGHT,
        ),
    }
}

/// 在图像上绘制所有检测框与标签, 返回绘制数量
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) -> usize {
    let font = label_font();
    for det in detections {
        draw_one(image, det, font);
    }
    detections.len()
}

fn draw_one(image: &mut RgbImage, det: &Detection, font: Option<&FontArc>) {
    let color = confidence_color(det.confidence);
    let x1 = det.x1 as i32;
    let y1 = det.y1 as i32;
    let x2 = det.x2 as i32;
    let y2 = det.y2 as i32;

    // 边框 (2像素)
    for t in 0..BOX_THICKNESS {
        let w = x2 - x1 - 2 * t;
        let h = y2 - y1 - 2 * t;
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            image,
            Rect::at(x1 + t, y1 + t).of_size(w as u32 + 1, h as u32 + 1),
            color,
        );
    }

    // 标签背景在框的左上角上方
    let caption = det.caption();
    let (text_w, text_h) = caption_size(font, &caption);
    let label_h = text_h as i32 + LABEL_PADDING;
    if text_w > 0 {
        draw_filled_rect_mut(
            image,
            Rect::at(x1, y1 - label_h).of_size(text_w, label_h as u32),
            color,
        );
    }

    if let Some(font) = font {
        draw_text_mut(
            image,
            TEXT_COLOR,
            x1,
            y1 - text_h as i32 - LABEL_BASELINE_OFFSET,
            PxScale::from(LABEL_FONT_SIZE),
            font,
            &caption,
        );
    }
}
