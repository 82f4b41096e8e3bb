mod control_panel;
mod file_browser;

pub use control_panel::{ControlPanel, ControlPanelActions, PANEL_WIDTH};
pub use file_browser::{list_dir, matches_filter, BrowsePurpose, Entry, FileBrowser};

use std::path::PathBuf;

use egui_macroquad::egui;
use image::RgbImage;
use macroquad::prelude::*;

use crate::app::{DetectionApp, Notice, NoticeLevel};

const PLACEHOLDER: &str = "Select an image or start detection to see results";
const TITLE_HEIGHT: f32 = 32.0;
const MARGIN: f32 = 10.0;

/// 在区域内等比缩放居中, 返回 (x, y, w, h)
pub fn fit_rect(src_w: f32, src_h: f32, x: f32, y: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    if src_w <= 0.0 || src_h <= 0.0 || w <= 0.0 || h <= 0.0 {
        return (x, y, 0.0, 0.0);
    }
    let scale = (w / src_w).min(h / src_h);
    let (dw, dh) = (src_w * scale, src_h * scale);
    (x + (w - dw) / 2.0, y + (h - dh) / 2.0, dw, dh)
}

fn rgba_bytes(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(image.width() as usize * image.height() as usize * 4);
    for p in image.pixels() {
        bytes.extend_from_slice(&[p[0], p[1], p[2], 255]);
    }
    bytes
}

pub struct Renderer {
    last_frame: Option<Texture2D>,
    generation: u64,
    control_panel: ControlPanel,
    file_browser: FileBrowser,
    /// 待显示的消息框, 一次显示一个
    notices: Vec<Notice>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            last_frame: None,
            generation: 0,
            control_panel: ControlPanel::default(),
            file_browser: FileBrowser::default(),
            notices: Vec::new(),
        }
    }

    /// 同步显示图像到纹理
    pub fn update(&mut self, app: &mut DetectionApp) {
        self.notices.extend(app.take_notices());

        if app.display_generation() == self.generation {
            return;
        }
        self.generation = app.display_generation();

        let Some(image) = app.display() else {
            self.last_frame = None;
            return;
        };
        // 图片与视频帧的边长都已限制在 u16 内
        let (width, height) = image.dimensions();
        let bytes = rgba_bytes(image);

        // 只在分辨率变化时重建纹理，否则更新像素数据
        let needs_rebuild = match &self.last_frame {
            Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(width as u16, height as u16, &bytes);
            texture.set_filter(FilterMode::Linear);
            self.last_frame = Some(texture);
        } else if let Some(tex) = &self.last_frame {
            tex.update(&Image {
                bytes,
                width: width as u16,
                height: height as u16,
            });
        }
    }

    pub fn draw(&self) {
        clear_background(Color::from_rgba(20, 20, 30, 255));

        let area_x = PANEL_WIDTH + MARGIN;
        let area_y = TITLE_HEIGHT + MARGIN;
        let area_w = screen_width() - area_x - MARGIN;
        let area_h = screen_height() - area_y - MARGIN;

        draw_text("Detection Display", area_x, TITLE_HEIGHT - 8.0, 24.0, WHITE);
        draw_rectangle_lines(area_x, area_y, area_w, area_h, 2.0, GRAY);

        match &self.last_frame {
            Some(texture) => {
                let (x, y, w, h) = fit_rect(
                    texture.width(),
                    texture.height(),
                    area_x,
                    area_y,
                    area_w,
                    area_h,
                );
                draw_texture_ex(
                    texture,
                    x,
                    y,
                    WHITE,
                    DrawTextureParams {
                        dest_size: Some(vec2(w, h)),
                        ..Default::default()
                    },
                );
            }
            None => {
                let font_size = 24;
                let dims = measure_text(PLACEHOLDER, None, font_size, 1.0);
                draw_text(
                    PLACEHOLDER,
                    area_x + (area_w - dims.width) / 2.0,
                    area_y + (area_h + dims.height) / 2.0,
                    font_size as f32,
                    LIGHTGRAY,
                );
            }
        }
    }

    pub fn draw_egui(&mut self, app: &mut DetectionApp) {
        let mut chosen: Option<(BrowsePurpose, PathBuf)> = None;

        egui_macroquad::ui(|egui_ctx| {
            if let Some(purpose) = self.control_panel.show(egui_ctx, app) {
                let start = match purpose {
                    BrowsePurpose::Model => app.config().model_dir.clone(),
                    _ => None,
                };
                self.file_browser.open(purpose, start.as_deref());
            }
            chosen = self.file_browser.show(egui_ctx);
            self.show_notice(egui_ctx);
        });

        egui_macroquad::draw();

        if let Some((purpose, path)) = chosen {
            match purpose {
                BrowsePurpose::Model => app.browse_model(path),
                BrowsePurpose::Image => app.select_image(path),
                BrowsePurpose::Video => app.select_video(path),
                BrowsePurpose::SaveImage => app.save_image(path),
            }
        }
    }

    fn show_notice(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notices.first() else {
            return;
        };
        let icon = match notice.level {
            NoticeLevel::Info => "ℹ",
            NoticeLevel::Warning => "⚠",
            NoticeLevel::Error => "❌",
        };

        let mut dismissed = false;
        egui::Window::new(notice.title.as_str())
            .id(egui::Id::new("notice"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("{} {}", icon, notice.message));
                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.notices.remove(0);
        }
    }
}
